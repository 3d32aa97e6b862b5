//! 命令行定义（clap derive）

use clap::{Parser, Subcommand};

/// Academic Insight Hub - course content, question bank and exam management
#[derive(Parser, Debug)]
#[command(name = "academic-insight-hub")]
#[command(version)]
#[command(about = "Course content, question bank and exam management with LLM assistance", long_about = None)]
pub struct Cli {
    /// Act as this user (defaults to the configured admin)
    #[arg(long = "as", global = true, value_name = "USERNAME")]
    pub acting_as: Option<String>,

    /// Override DATABASE_URL
    #[arg(long, global = true)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create tables, default roles and the admin account
    Init,

    /// Manage users
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Manage roles and permissions
    Role {
        #[command(subcommand)]
        action: RoleCommands,
    },

    /// Manage courses
    Course {
        #[command(subcommand)]
        action: CourseCommands,
    },

    /// Manage chapters
    Chapter {
        #[command(subcommand)]
        action: ChapterCommands,
    },

    /// Manage questions
    Question {
        #[command(subcommand)]
        action: QuestionCommands,
    },

    /// Analyze every question of a chapter with the LLM
    Analyze {
        chapter_id: i64,

        /// Write difficulty, time, level and tags back to the questions
        #[arg(long)]
        apply: bool,
    },

    /// Ask the LLM to review the difficulty of a stored question
    Review { question_id: i64 },

    /// Generate new questions for a chapter
    Generate {
        chapter_id: i64,

        #[arg(long, default_value_t = 3)]
        count: usize,

        /// Question type, e.g. "Multiple Choice"
        #[arg(long = "type", default_value = "Multiple Choice")]
        question_type: String,

        /// Beginner, Intermediate or Advanced
        #[arg(long, default_value = "Intermediate")]
        level: String,

        /// Store the generated questions
        #[arg(long)]
        save: bool,
    },

    /// Build and inspect exams
    Exam {
        #[command(subcommand)]
        action: ExamCommands,
    },

    /// Answer a question as the acting user
    ///
    /// Essay questions are graded by the student: submit the answer first,
    /// then record the verdict with `--self-eval yes|no`.
    Answer {
        question_id: i64,
        #[arg(required_unless_present = "self_eval", conflicts_with = "self_eval")]
        answer: Option<String>,
        /// Self-evaluation for an essay question
        #[arg(long = "self-eval", value_name = "yes|no", value_parser = clap::builder::BoolishValueParser::new())]
        self_eval: Option<bool>,
    },

    /// Show the acting user's progress
    Progress,

    /// Show content and progress statistics
    Stats {
        #[arg(long)]
        course: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Create a user with a role
    Add {
        username: String,
        email: String,
        password: String,
        #[arg(long, default_value = "student")]
        role: String,
    },
    /// List users and their roles
    List,
    /// Replace a user's roles with a single role
    SetRole { username: String, role: String },
    /// Give a user an additional role
    AddRole { username: String, role: String },
    /// Delete a user
    Delete { username: String },
}

#[derive(Subcommand, Debug)]
pub enum RoleCommands {
    /// List roles and granted permissions
    List,
    /// Grant a permission to a role
    Grant { role: String, permission: String },
    /// Revoke a permission from a role
    Revoke { role: String, permission: String },
    /// Create a role
    Create {
        name: String,
        /// Comma separated permission names
        #[arg(long, value_delimiter = ',')]
        permissions: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum CourseCommands {
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    List {
        #[arg(long)]
        search: Option<String>,
    },
    Delete { id: i64 },
    /// Export a course to a TOML question bank
    Export { id: i64, path: String },
}

#[derive(Subcommand, Debug)]
pub enum ChapterCommands {
    Add {
        course_id: i64,
        title: String,
        #[arg(long)]
        summary: Option<String>,
        /// Intended learning outcomes, one per line
        #[arg(long)]
        ilos: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum QuestionCommands {
    /// Add a question
    Add {
        #[arg(long)]
        chapter: i64,
        #[arg(long)]
        content: String,
        #[arg(long = "type", default_value = "Short Answer")]
        question_type: String,
        /// Multiple choice option (repeat four times)
        #[arg(long = "option")]
        options: Vec<String>,
        #[arg(long)]
        answer: Option<String>,
        #[arg(long)]
        explanation: Option<String>,
        #[arg(long)]
        difficulty: Option<f64>,
        #[arg(long)]
        tags: Option<String>,
        /// Let the LLM rate the difficulty before saving
        #[arg(long)]
        ai: bool,
    },
    /// List questions
    List {
        #[arg(long)]
        course: Option<i64>,
        #[arg(long)]
        chapter: Option<i64>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        per_page: usize,
    },
    /// Import a TOML question bank (or every bank in a directory)
    Import { path: String },
}

#[derive(Subcommand, Debug)]
pub enum ExamCommands {
    /// Randomly build an exam from filtered questions and save it
    Build {
        #[arg(long)]
        course: i64,
        /// Chapter ids (repeatable)
        #[arg(long = "chapter", required = true)]
        chapters: Vec<i64>,
        #[arg(long, default_value_t = 1.0)]
        min_difficulty: f64,
        #[arg(long, default_value_t = 5.0)]
        max_difficulty: f64,
        /// Question types (repeatable)
        #[arg(long = "type")]
        types: Vec<String>,
        #[arg(long, default_value_t = 10)]
        total: usize,
        #[arg(long, default_value_t = 1)]
        points: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value_t = 60)]
        time_limit: i64,
        /// Random seed for reproducible exams
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show an exam and its questions
    Show { id: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer_or_self_evaluation() {
        let cli = Cli::try_parse_from(["academic-insight-hub", "answer", "7", "Mitochondria"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Answer { question_id: 7, answer: Some(ref a), self_eval: None } if a == "Mitochondria"
        ));

        let cli = Cli::try_parse_from(["academic-insight-hub", "answer", "7", "--self-eval", "no"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Answer { answer: None, self_eval: Some(false), .. }
        ));

        assert!(Cli::try_parse_from(["academic-insight-hub", "answer", "7"]).is_err());
        assert!(Cli::try_parse_from(["academic-insight-hub", "answer", "7", "text", "--self-eval", "yes"]).is_err());
    }

    #[test]
    fn test_parse_global_acting_user() {
        let cli = Cli::try_parse_from([
            "academic-insight-hub",
            "course",
            "add",
            "Physics",
            "--as",
            "prof",
        ])
        .unwrap();
        assert_eq!(cli.acting_as.as_deref(), Some("prof"));
        assert!(matches!(
            cli.command,
            Commands::Course {
                action: CourseCommands::Add { .. }
            }
        ));
    }

    #[test]
    fn test_parse_exam_build() {
        let cli = Cli::try_parse_from([
            "academic-insight-hub",
            "exam",
            "build",
            "--course",
            "1",
            "--chapter",
            "2",
            "--chapter",
            "3",
            "--type",
            "Essay",
            "--title",
            "Final",
            "--seed",
            "9",
        ])
        .unwrap();
        match cli.command {
            Commands::Exam {
                action: ExamCommands::Build { chapters, types, total, seed, .. },
            } => {
                assert_eq!(chapters, vec![2, 3]);
                assert_eq!(types, vec!["Essay".to_string()]);
                assert_eq!(total, 10);
                assert_eq!(seed, Some(9));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_role_create_splits_permissions() {
        let cli = Cli::try_parse_from([
            "academic-insight-hub",
            "role",
            "create",
            "grader",
            "--permissions",
            "view_course,grade_submissions",
        ])
        .unwrap();
        match cli.command {
            Commands::Role {
                action: RoleCommands::Create { permissions, .. },
            } => assert_eq!(permissions.len(), 2),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
