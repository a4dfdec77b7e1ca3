pub const TICK_RATE_MS: u64 = 50; // UI frame / animation step

// Profit chart view window
pub const WINDOW_STEP: usize = 100;
pub const INITIAL_WINDOW_OFFSET: usize = 100;
pub const GRID_LINES: usize = 10;
pub const CHART_PADDING: f64 = 6.0; // in canvas dots

// Bar panel sliders
pub const ITEMS_MIN: usize = 1;
pub const ITEMS_MAX: usize = 20;
pub const ITEMS_DEFAULT: usize = 5;
pub const SERIES_MIN: usize = 1;
pub const SERIES_MAX: usize = 10;
pub const SERIES_DEFAULT: usize = 2;
pub const ANIMATION_EASE: f64 = 0.25;

// Export panel
pub const DEFAULT_CSV_NAME: &str = "data.csv";
pub const REPORT_FILE_NAME: &str = "download-report.pdf";
pub const DOWNLOAD_CHUNK_BYTES: usize = 8 * 1024;
