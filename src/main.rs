//! codetutor CLI binary
//!
//! All logic is in the library; main.rs loads `.env` and invokes cli::run().

fn main() {
    // A missing .env is not an error.
    dotenvy::dotenv().ok();

    // cli::run() prints its own errors; main only maps to process exit
    if let Err(code) = codetutor::cli::run() {
        std::process::exit(code.as_i32());
    }
}
