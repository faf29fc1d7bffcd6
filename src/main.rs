#[macro_use]
extern crate log;

mod cli;

fn main() {
    match cli::cli() {
        Ok(_) => {}
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
