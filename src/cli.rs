use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "course-scan")]
#[command(about = "Keep a course catalog in sync with course directories on disk", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Register a course directory and scan it
    AddCourse {
        /// Course root directory
        path: String,
        /// Display title, defaults to the directory name
        #[arg(short, long)]
        title: Option<String>,
    },
    /// Queue a scan for one course and wait for it to finish
    Scan {
        course_id: i64,
    },
    /// Queue a scan for every course and wait for all of them
    ScanAll,
    /// List courses in the catalog
    ListCourses,
    /// Show the lessons and attachments of a course
    ShowCourse {
        course_id: i64,
    },
    /// Print configuration values
    PrintConfig,
    /// Truncate all database tables
    TruncateDb,
}
