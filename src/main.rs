use std::process;

fn main() {
    if let Err(error) = requests_feed::run() {
        requests_feed::report(&error);
        process::exit(1);
    }
}
