fn main() {
    match rbt::cli::run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            println!("Error: {:#}", err);
            std::process::exit(1);
        }
    }
}
