use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use simplelog::{Config, LevelFilter, WriteLogger};

use pagepin::anchor::ClickEvent;
use pagepin::comments::{CommentService, LocalCommentStore, StoreConfig};
use pagepin::geometry::Point;
use pagepin::static_page::StaticPage;
use pagepin::{ClickOutcome, CommentOverlay, OverlayConfig};

/// Inspect and edit comment pins against a page snapshot.
#[derive(Parser)]
#[command(name = "pagepin", version, about)]
struct Cli {
    /// Page snapshot JSON file
    #[arg(long, value_name = "FILE")]
    page: PathBuf,

    /// Comment storage directory (defaults to .pagepin_comments)
    #[arg(long, value_name = "DIR")]
    store_dir: Option<PathBuf>,

    /// Author name for new comments
    #[arg(long)]
    author: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List stored comments for the page
    List,
    /// Place a comment at client coordinates
    Place {
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        /// Comment text
        text: String,
    },
    /// Resolve every stored comment to its current pin position
    Pins,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    WriteLogger::init(
        LevelFilter::Debug,
        Config::default(),
        File::create("pagepin.log")?,
    )?;

    info!("Starting pagepin inspector");

    let page = StaticPage::load(&cli.page)?;

    let dir = cli.store_dir.unwrap_or_else(LocalCommentStore::default_dir);
    let store = CommentService::new(StoreConfig::default(), LocalCommentStore::with_dir(dir));

    let mut config = OverlayConfig::default();
    if let Some(author) = cli.author {
        config.author_name = author;
    }

    let mut overlay = CommentOverlay::new(config, Box::new(store));
    overlay.attach(&page);

    match cli.command {
        Command::List => {
            let comments = overlay.list_comments();
            if comments.is_empty() {
                println!("No comments for {}", overlay.page_url());
            }
            for (index, comment) in comments.iter().enumerate() {
                println!(
                    "{:>3}. {} by {} ({})",
                    index + 1,
                    comment.text,
                    comment.author,
                    comment.created_at.format("%Y-%m-%d %H:%M"),
                );
            }
        }
        Command::Place { x, y, text } => {
            overlay.enable_comment_mode();
            let event = ClickEvent::at_client(&page, Point::new(x, y));
            match overlay.handle_click(&page, event) {
                ClickOutcome::EditorOpened => {
                    let comment = overlay
                        .submit_editor(&text)
                        .context("Comment text is empty")?;
                    println!("Placed {} at ({}, {})", comment.id, x, y);
                }
                ClickOutcome::FocusedPin(target) => {
                    println!("Pin {} ({}) is already there", target.index, target.comment_id);
                }
                ClickOutcome::Ignored => {
                    println!("Nothing commentable at ({}, {})", x, y);
                }
            }
        }
        Command::Pins => {
            if overlay.markers().is_empty() {
                println!("No pins for {}", overlay.page_url());
            }
            for marker in overlay.markers() {
                println!(
                    "{:>3}. ({:.1}, {:.1}) {}",
                    marker.index, marker.position.x, marker.position.y, marker.comment_id,
                );
            }
        }
    }

    info!("Shutting down pagepin");
    Ok(())
}
