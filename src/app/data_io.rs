const URL_COLUMN: &str = "url";
const DEFAULT_OUTPUT_STEM: &str = "extracted_features";

#[derive(Debug, Clone)]
struct UrlSource {
    path: PathBuf,
    kind: UrlSourceKind,
}

impl UrlSource {
    fn open(path: &Path) -> io::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(io::Error::other)?;
        let headers = reader.headers().map_err(io::Error::other)?;
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim().eq_ignore_ascii_case(name))
        };
        let kind = match (find("domain"), find(URL_COLUMN)) {
            (Some(index), _) => UrlSourceKind::CsvColumn {
                index,
                domain: true,
            },
            (None, Some(index)) => UrlSourceKind::CsvColumn {
                index,
                domain: false,
            },
            (None, None) => UrlSourceKind::Lines,
        };
        Ok(Self {
            path: path.to_path_buf(),
            kind,
        })
    }

    fn urls(&self) -> io::Result<Box<dyn Iterator<Item = String>>> {
        match self.kind {
            UrlSourceKind::CsvColumn { index, domain } => {
                let reader = csv::ReaderBuilder::new()
                    .flexible(true)
                    .from_path(&self.path)
                    .map_err(io::Error::other)?;
                let path = self.path.display().to_string();
                Ok(Box::new(
                    reader
                        .into_records()
                        .filter_map(move |record| match record {
                            Ok(record) => Some(record),
                            Err(err) => {
                                tracing::warn!("{path}: skipping malformed record: {err}");
                                None
                            }
                        })
                        .filter_map(move |record| {
                            let value = record.get(index)?.trim();
                            if value.is_empty() {
                                None
                            } else if domain {
                                Some(format!("https://{value}"))
                            } else {
                                Some(value.to_string())
                            }
                        }),
                ))
            }
            UrlSourceKind::Lines => {
                let file = File::open(&self.path)?;
                let path = self.path.display().to_string();
                Ok(Box::new(
                    BufReader::new(file)
                        .lines()
                        .map_while(move |line| {
                            line.inspect_err(|err| tracing::warn!("{path}: stopped reading: {err}"))
                                .ok()
                        })
                        .filter_map(|line| {
                            let line = line.trim();
                            if line.is_empty() || line.starts_with('#') {
                                None
                            } else {
                                Some(line.to_string())
                            }
                        }),
                ))
            }
        }
    }
}

#[derive(Serialize)]
struct ExportRecord<'a> {
    #[serde(flatten)]
    features: &'a FeatureVector,
    url: &'a str,
}

struct CsvSink {
    writer: csv::Writer<File>,
}

impl CsvSink {
    fn new(output_path: &Path) -> io::Result<Self> {
        let file = File::create(output_path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(SCHEMA.iter().copied().chain([URL_COLUMN]))?;
        Ok(Self { writer })
    }

    fn write_row(&mut self, url: &str, vector: &FeatureVector) -> io::Result<()> {
        let mut record = vector
            .values()
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>();
        record.push(url.to_string());
        self.writer.write_record(&record)?;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

struct JsonSink {
    file: File,
    first: bool,
    closed: bool,
}

impl JsonSink {
    fn new(output_path: &Path) -> io::Result<Self> {
        let mut file = File::create(output_path)?;
        file.write_all(b"[\n")?;
        Ok(Self {
            file,
            first: true,
            closed: false,
        })
    }

    fn write_row(&mut self, url: &str, vector: &FeatureVector) -> io::Result<()> {
        if !self.first {
            self.file.write_all(b",\n")?;
        }
        self.first = false;
        let record = ExportRecord {
            features: vector,
            url,
        };
        serde_json::to_writer(&mut self.file, &record).map_err(io::Error::other)?;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }

    fn finalize(&mut self) -> io::Result<()> {
        if !self.closed {
            if self.first {
                self.file.write_all(b"]\n")?;
            } else {
                self.file.write_all(b"\n]\n")?;
            }
            self.closed = true;
        }
        self.file.flush()
    }
}

impl Drop for JsonSink {
    fn drop(&mut self) {
        let _ = self.finalize();
    }
}

enum OutputSink {
    Csv(CsvSink),
    Json(JsonSink),
}

impl OutputSink {
    fn new(output_path: &Path, format: DataFormat) -> io::Result<Self> {
        match format {
            DataFormat::Csv => Ok(OutputSink::Csv(CsvSink::new(output_path)?)),
            DataFormat::Json => Ok(OutputSink::Json(JsonSink::new(output_path)?)),
        }
    }

    fn write_row(&mut self, url: &str, vector: &FeatureVector) -> io::Result<()> {
        match self {
            OutputSink::Csv(sink) => sink.write_row(url, vector),
            OutputSink::Json(sink) => sink.write_row(url, vector),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputSink::Csv(sink) => sink.flush(),
            OutputSink::Json(sink) => sink.flush(),
        }
    }

    fn finalize(&mut self) -> io::Result<()> {
        match self {
            OutputSink::Csv(sink) => sink.flush(),
            OutputSink::Json(sink) => sink.finalize(),
        }
    }
}

fn detect_data_format(path: &Path, fallback: DataFormat) -> DataFormat {
    let lower = path.to_string_lossy().to_ascii_lowercase();
    if lower.ends_with(".json") {
        DataFormat::Json
    } else if lower.ends_with(".csv") {
        DataFormat::Csv
    } else {
        fallback
    }
}

fn default_output_path(format: DataFormat) -> PathBuf {
    match format {
        DataFormat::Csv => PathBuf::from(format!("{DEFAULT_OUTPUT_STEM}.csv")),
        DataFormat::Json => PathBuf::from(format!("{DEFAULT_OUTPUT_STEM}.json")),
    }
}
