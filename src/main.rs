fn main() {
    if let Err(err) = grader_extract::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
