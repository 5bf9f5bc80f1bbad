mod cli;
mod logging;

use std::io::{self, Write};
use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use colored::*;
use course_scan::storage::models::Course;
use course_scan::{process_scan, AppConfig, CatalogStore, Database, ScanQueue, ScanSettings};
use dotenv::dotenv;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match course_scan::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    match args.command {
        Some(Commands::AddCourse { path, title }) => {
            let course = add_course(&config, &path, title)?;
            run_scans(&config, &[course.id])?;
        }
        Some(Commands::Scan { course_id }) => {
            run_scans(&config, &[course_id])?;
        }
        Some(Commands::ScanAll) => {
            let db = Database::open(&config.database_path)?;
            let ids: Vec<i64> = db.list_courses()?.iter().map(|c| c.id).collect();
            drop(db);
            if ids.is_empty() {
                info!("No courses to scan");
            } else {
                run_scans(&config, &ids)?;
            }
        }
        Some(Commands::ListCourses) => {
            let db = Database::open(&config.database_path)?;
            for course in db.list_courses()? {
                print_course(&course);
                if let Some(card) = &course.card_path {
                    println!("      card: {}", card.cyan());
                }
            }
        }
        Some(Commands::ShowCourse { course_id }) => {
            show_course(&config, course_id)?;
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
        }
        Some(Commands::TruncateDb) => {
            match prompt_confirm(
                "Are you SURE you want to COMPLETELY DELETE the catalog?",
                Some(false),
            ) {
                Ok(true) => {
                    let db = Database::open(&config.database_path)?;
                    db.truncate_all()?;
                    println!("All tables truncated");
                }
                _ => process::exit(0),
            }
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn add_course(config: &AppConfig, path: &str, title: Option<String>) -> anyhow::Result<Course> {
    let root = Path::new(path)
        .canonicalize()
        .with_context(|| format!("Course path {} is not accessible", path))?;
    let title = title.unwrap_or_else(|| {
        root.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.to_string_lossy().into_owned())
    });

    let db = Database::open(&config.database_path)?;
    let course = db.create_course(&title, &root.to_string_lossy())?;
    info!(course_id = course.id, path = %course.path, "Added course");
    Ok(course)
}

/// Queue the given courses, let the worker drain the queue, then stop it.
/// Scans left over from an interrupted run are picked up as well.
fn run_scans(config: &AppConfig, course_ids: &[i64]) -> anyhow::Result<()> {
    let db = Database::open(&config.database_path)?;
    let queue = Arc::new(ScanQueue::new(db, ScanSettings::from_config(config)));

    let (done_tx, done_rx) = flume::unbounded();
    let worker = queue.start_worker(process_scan, Some(done_tx))?;
    queue.resume_pending()?;

    for &course_id in course_ids {
        if let Err(err) = queue.add(course_id) {
            error!(course_id, "Unable to queue scan: {}", err);
        }
    }

    loop {
        let pending = queue.store().next_waiting_scan()?;
        if pending.is_none() {
            break;
        }
        if done_rx.recv().is_err() {
            break;
        }
    }

    queue.shutdown();
    worker
        .join()
        .map_err(|_| anyhow!("scan worker panicked"))?;

    for &course_id in course_ids {
        if let Some(course) = queue.store().get_course(course_id)? {
            print_course(&course);
        }
    }

    Ok(())
}

fn print_course(course: &Course) {
    let status = if course.available {
        "available".green()
    } else {
        "unavailable".red()
    };
    println!(
        "{:>4}  {}  {}  [{}]",
        course.id,
        course.title.bold(),
        course.path.dimmed(),
        status
    );
}

fn show_course(config: &AppConfig, course_id: i64) -> anyhow::Result<()> {
    let db = Database::open(&config.database_path)?;
    let course = db
        .get_course(course_id)?
        .ok_or_else(|| anyhow!("Course {} not found", course_id))?;

    print_course(&course);
    if let Some(card) = &course.card_path {
        println!("      card: {}", card.cyan());
    }

    let assets = db.list_assets(course.id)?;
    let ids: Vec<i64> = assets.iter().map(|a| a.id).collect();
    let attachments = db.list_attachments(&ids)?;

    let mut chapter: Option<&str> = None;
    for asset in &assets {
        if chapter != Some(asset.chapter.as_str()) {
            chapter = Some(asset.chapter.as_str());
            if !asset.chapter.is_empty() {
                println!("  {}", asset.chapter.yellow());
            }
        }
        println!(
            "    {:>3} {} ({})",
            asset.prefix,
            asset.title,
            asset.asset_type.to_string().green()
        );
        for attachment in attachments.iter().filter(|a| a.asset_id == asset.id) {
            println!("          + {}", attachment.title.dimmed());
        }
    }

    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
