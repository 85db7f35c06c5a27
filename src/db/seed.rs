use super::Store;
use crate::domain::models::{
    Employee, NewActivityLog, NewEmployee, NewFeedback, NewNotification, NewReport, NewUser,
    NotificationType, Sentiment, User, UserRole,
};
use anyhow::{Context, Result};
use serde_json::json;

pub const HR_EMAIL: &str = "hr@pulsecheck.dev";
pub const LEAD_EMAIL: &str = "lead@pulsecheck.dev";

struct SeedEmployee<'a> {
    name: &'a str,
    email: &'a str,
    department: &'a str,
    position: &'a str,
    score: i32,
}

const EMPLOYEES: [SeedEmployee<'static>; 5] = [
    SeedEmployee {
        name: "John Doe",
        email: "john.doe@company.com",
        department: "Engineering",
        position: "Senior Developer",
        score: 85,
    },
    SeedEmployee {
        name: "Jane Smith",
        email: "jane.smith@company.com",
        department: "Marketing",
        position: "Marketing Manager",
        score: 92,
    },
    SeedEmployee {
        name: "Bob Johnson",
        email: "bob.johnson@company.com",
        department: "Sales",
        position: "Sales Representative",
        score: 78,
    },
    SeedEmployee {
        name: "Alice Williams",
        email: "alice.williams@company.com",
        department: "Engineering",
        position: "Frontend Developer",
        score: 88,
    },
    SeedEmployee {
        name: "Charlie Brown",
        email: "charlie.brown@company.com",
        department: "Design",
        position: "UX Designer",
        score: 90,
    },
];

enum Author {
    Hr,
    Lead,
}

struct SeedFeedback<'a> {
    text: &'a str,
    sentiment: Sentiment,
    category: &'a str,
    employee: usize,
    author: Author,
}

const FEEDBACK: [SeedFeedback<'static>; 8] = [
    SeedFeedback {
        text: "Great team collaboration and supportive environment. Everyone is willing to help each other out.",
        sentiment: Sentiment::Positive,
        category: "Team Culture",
        employee: 0,
        author: Author::Lead,
    },
    SeedFeedback {
        text: "Would like more opportunities for professional development and training programs.",
        sentiment: Sentiment::Neutral,
        category: "Career Growth",
        employee: 1,
        author: Author::Lead,
    },
    SeedFeedback {
        text: "Excellent work-life balance and flexible hours. Very satisfied with remote work options.",
        sentiment: Sentiment::Positive,
        category: "Work-Life Balance",
        employee: 3,
        author: Author::Lead,
    },
    SeedFeedback {
        text: "The new project management tools are not very intuitive. Need better documentation.",
        sentiment: Sentiment::Negative,
        category: "Tools & Resources",
        employee: 2,
        author: Author::Lead,
    },
    SeedFeedback {
        text: "Really enjoying the creative freedom in design work. Great to see our ideas being implemented.",
        sentiment: Sentiment::Positive,
        category: "Work Environment",
        employee: 4,
        author: Author::Lead,
    },
    SeedFeedback {
        text: "Communication between departments could be improved. Sometimes unclear about project priorities.",
        sentiment: Sentiment::Neutral,
        category: "Communication",
        employee: 0,
        author: Author::Hr,
    },
    SeedFeedback {
        text: "The quarterly reviews are very helpful. Good feedback and clear goals.",
        sentiment: Sentiment::Positive,
        category: "Performance Reviews",
        employee: 1,
        author: Author::Hr,
    },
    SeedFeedback {
        text: "Office facilities are great but could use more meeting rooms during peak hours.",
        sentiment: Sentiment::Neutral,
        category: "Facilities",
        employee: 3,
        author: Author::Hr,
    },
];

/// Loads the demo dataset. Does nothing when the HR account already exists.
pub async fn seed_all(store: &dyn Store) -> Result<()> {
    if store.get_user_by_email(HR_EMAIL).await?.is_some() {
        tracing::info!("Demo data already present, skipping seed");
        return Ok(());
    }

    let hr = account(store, HR_EMAIL, "HR Manager", UserRole::Hr).await?;
    let lead = account(store, LEAD_EMAIL, "Team Lead", UserRole::Lead).await?;
    let employees = seed_employees(store).await?;

    for entry in FEEDBACK.iter() {
        let author = match entry.author {
            Author::Hr => &hr,
            Author::Lead => &lead,
        };
        store
            .create_feedback(NewFeedback {
                feedback: entry.text.to_string(),
                sentiment: entry.sentiment,
                category: entry.category.to_string(),
                employee_id: employees[entry.employee].id,
                author_id: author.id,
            })
            .await
            .with_context(|| format!("seeding feedback for {}", employees[entry.employee].name))?;
    }

    store
        .create_activity_log(NewActivityLog {
            action: "login".into(),
            description: "logged into the system".into(),
            user_id: hr.id,
            user_name: hr.name.clone(),
            metadata: None,
        })
        .await?;
    store
        .create_activity_log(NewActivityLog {
            action: "create".into(),
            description: "added a new employee".into(),
            user_id: hr.id,
            user_name: hr.name.clone(),
            metadata: Some(json!({ "employeeId": employees[0].id })),
        })
        .await?;

    store
        .create_notification(NewNotification {
            title: "Welcome to PulseCheck".into(),
            message: "Your account has been set up successfully.".into(),
            kind: NotificationType::Info,
            user_id: hr.id,
            action_url: None,
        })
        .await?;
    store
        .create_notification(NewNotification {
            title: "New Feedback Submitted".into(),
            message: "Team Lead has submitted feedback for John Doe.".into(),
            kind: NotificationType::Success,
            user_id: hr.id,
            action_url: Some("/hr-dashboard".into()),
        })
        .await?;

    store
        .create_report(NewReport {
            title: "Monthly Satisfaction Report - November 2025".into(),
            kind: "Satisfaction".into(),
            data: json!({
                "averageScore": 86.6,
                "totalEmployees": 5,
                "byDepartment": {
                    "Engineering": 86.5,
                    "Marketing": 92,
                    "Sales": 78,
                    "Design": 90
                }
            }),
            created_by_id: hr.id,
        })
        .await?;

    tracing::info!(
        "Seeded demo data: {} employees, {} feedback entries",
        employees.len(),
        FEEDBACK.len()
    );
    Ok(())
}

async fn account(store: &dyn Store, email: &str, name: &str, role: UserRole) -> Result<User> {
    store
        .get_or_create_user(NewUser {
            email: email.to_string(),
            name: name.to_string(),
            role,
        })
        .await
        .with_context(|| format!("seeding account {email}"))
}

async fn seed_employees(store: &dyn Store) -> Result<Vec<Employee>> {
    let mut created = Vec::with_capacity(EMPLOYEES.len());
    for seed in EMPLOYEES.iter() {
        let employee = store
            .create_employee(NewEmployee {
                name: seed.name.to_string(),
                email: seed.email.to_string(),
                department: seed.department.to_string(),
                position: seed.position.to_string(),
                satisfaction_score: Some(seed.score),
                join_date: None,
            })
            .await
            .with_context(|| format!("seeding employee {}", seed.email))?;
        account(store, seed.email, seed.name, UserRole::Employee).await?;
        created.push(employee);
    }
    Ok(created)
}
