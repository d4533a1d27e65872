use std::process::ExitCode;

fn main() -> ExitCode {
    match voc2tfrecord::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}
