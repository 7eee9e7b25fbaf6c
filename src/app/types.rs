#[derive(Debug, Parser, Clone)]
#[command(
    name = "phishfeat",
    version,
    about = "Extract fixed-schema phishing features from URLs into CSV/JSON"
)]
struct Cli {
    #[arg(value_name = "URL", required_unless_present = "input")]
    urls: Vec<String>,

    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = FileFormatArg::Csv)]
    format: FileFormatArg,

    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Copy, Clone, ValueEnum, PartialEq, Eq)]
enum FileFormatArg {
    Csv,
    Json,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum DataFormat {
    Csv,
    Json,
}

impl From<FileFormatArg> for DataFormat {
    fn from(value: FileFormatArg) -> Self {
        match value {
            FileFormatArg::Csv => DataFormat::Csv,
            FileFormatArg::Json => DataFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum UrlSourceKind {
    CsvColumn { index: usize, domain: bool },
    Lines,
}
