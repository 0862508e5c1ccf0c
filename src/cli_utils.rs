use indicatif::{ProgressBar, ProgressStyle};

const BYTES_TEMPLATE: &str =
    "[{elapsed_precise}] {msg} {spinner:.green} [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} eta: {eta}";
const COUNT_TEMPLATE: &str =
    "[{elapsed_precise}] {msg} {spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} eta: {eta}";
const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {msg} {spinner:.green}";

fn create_progress_bar(
    quiet_mode: bool,
    msg: &str,
    length: Option<u64>,
    bar_template: &str,
) -> ProgressBar {
    if quiet_mode {
        return ProgressBar::hidden();
    }

    let bar = match length {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(bar_template)
                    .progress_chars("=> "),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(ProgressStyle::default_spinner().template(SPINNER_TEMPLATE));
            bar
        }
    };

    bar.set_message(msg);
    bar.inc(0); // Just to avoid the drawing after the log.

    bar
}

pub fn create_progress_bar_bytes(quiet_mode: bool, msg: &str, length: Option<u64>) -> ProgressBar {
    create_progress_bar(quiet_mode, msg, length, BYTES_TEMPLATE)
}

pub fn create_progress_bar_count(quiet_mode: bool, msg: &str, length: Option<u64>) -> ProgressBar {
    create_progress_bar(quiet_mode, msg, length, COUNT_TEMPLATE)
}
