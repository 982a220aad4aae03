//! Async tail printing lines one at a time, as they appear.
//!
//! Usage: cargo run --example atail -- <path>...

use std::env;

use tailmux::AsyncTail;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let paths: Vec<String> = env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: atail <path>...");
        std::process::exit(2);
    }

    let mut tail = AsyncTail::new()?;
    for path in paths {
        tail.add_file(path).await?;
    }

    loop {
        let line = tail.next_line().await?;
        println!("{}: {}", line.source().display(), line.line());
    }
}
