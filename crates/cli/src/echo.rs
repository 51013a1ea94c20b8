use owo_colors::OwoColorize;
use xxkcd_core::{Archive, Article, Comic};

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!("\n{} {} {}", "xxkcd".bold().bright_blue(), "v".dimmed(), VERSION.dimmed());
    eprintln!("{}", "xkcd comics and what-if articles\n".dimmed());
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

/// Print timing information with color coding
pub fn print_timing(label: &str, duration: std::time::Duration) {
    let ms = duration.as_secs_f64() * 1000.0;
    let label = format!("{}:", label);

    if ms < 500.0 {
        eprintln!("  {} {:>8.2}ms ({})", label.dimmed(), ms, "fast".dimmed());
    } else if ms < 2000.0 {
        eprintln!("  {} {:>8.2}ms ({})", label.dimmed(), ms, "moderate".bright_yellow());
    } else {
        eprintln!("  {} {:>8.2}ms ({})", label.dimmed(), ms, "slow".bright_red());
    }
}

/// Format file size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

pub fn print_comic(comic: &Comic) -> xxkcd_core::Result<()> {
    let metadata = comic.metadata()?;

    println!("{} {}", format!("#{}", metadata.num).dimmed(), metadata.title.bold().bright_blue());
    if let Ok(date) = comic.publication_date() {
        println!("  {} {}", "Date:".dimmed(), date.bright_white());
    }
    if !metadata.img.is_empty() {
        println!("  {} {}", "Image:".dimmed(), metadata.img.bright_white());
    }
    println!("  {} {}", "Link:".dimmed(), comic.url().bright_white().underline());
    if !metadata.alt.is_empty() {
        println!("\n{}", metadata.alt.italic());
    }
    Ok(())
}

pub fn print_article(article: &Article) -> xxkcd_core::Result<()> {
    println!(
        "{} {}",
        format!("#{}", article.number()?).dimmed(),
        article.title()?.bold().bright_blue()
    );
    println!("  {} {}", "Date:".dimmed(), article.date()?.bright_white());
    println!("  {} {}", "Link:".dimmed(), article.url().bright_white().underline());
    println!("\n{}", article.question()?.italic());
    println!("{}", article.attribute()?.dimmed());
    Ok(())
}

pub fn print_archive(archive: &Archive) {
    for (index, entry) in archive.iter().enumerate() {
        println!(
            "{:>4}  {}  {}",
            (index + 1).dimmed(),
            entry.date.to_string().dimmed(),
            entry.title.bright_white()
        );
    }
}
