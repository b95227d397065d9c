use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str = "{msg} [{bar:40.cyan/blue}] {pos:>7}/{len:7} ({eta})";

/// Create a standard progress bar. An empty message with nothing to count
/// gives a hidden bar, as does `visible == false`.
pub fn create_progress_bar(total: u64, message: &str, visible: bool) -> ProgressBar {
    if !visible || (total == 0 && message.is_empty()) {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━─");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}
