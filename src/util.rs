// Money amounts: two decimals, dollar sign
pub fn format_money(amount: f64) -> String {
    format!("${:.2}", amount)
}

// Elapsed seconds as MM:SS
pub fn format_elapsed(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn spinner(frame: u64) -> char {
    const FRAMES: [char; 4] = ['|', '/', '-', '\\'];
    FRAMES[(frame % FRAMES.len() as u64) as usize]
}
