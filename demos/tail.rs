//! Blocking tail of one or more files, printing batches as they arrive.
//!
//! Usage: cargo run --example tail -- <path>...

use std::env;

use tailmux::Tail;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let paths: Vec<String> = env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: tail <path>...");
        std::process::exit(2);
    }

    let mut tail = Tail::new(paths)?;

    let interrupt = tail.interrupt_handle();
    ctrlc::set_handler(move || interrupt.interrupt())?;

    for batch in &mut tail {
        for line in batch? {
            println!("{}: {}", line.source().display(), line.line());
        }
    }
    tail.close();

    Ok(())
}
