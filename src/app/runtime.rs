pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    phishfeat::logging::init_logging(cli.verbose);

    let mut config = match cli.config.as_deref() {
        Some(path) => ExtractorConfig::load(path)?,
        None => ExtractorConfig::default(),
    };
    if let Some(concurrency) = cli.concurrency {
        config.max_concurrent_urls = concurrency;
    }
    let config = config.sanitized();

    let source = cli
        .input
        .as_deref()
        .map(UrlSource::open)
        .transpose()
        .with_context(|| format!("opening URL list {:?}", cli.input))?;

    let configured_format: DataFormat = cli.format.into();
    let output_format = cli
        .output
        .as_deref()
        .map(|path| detect_data_format(path, configured_format))
        .unwrap_or(configured_format);
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(output_format));

    let mut sink = OutputSink::new(&output_path, output_format)
        .with_context(|| format!("creating {}", output_path.display()))?;
    let extractor = Arc::new(FeatureExtractor::new(&config)?);

    let mut urls: Box<dyn Iterator<Item = String>> = Box::new(cli.urls.clone().into_iter());
    if let Some(source) = &source {
        urls = Box::new(urls.chain(source.urls()?));
    }

    let processed = run_batch(extractor, urls, config.max_concurrent_urls, &mut sink).await?;
    sink.finalize()?;
    tracing::info!("processed {processed} urls, output={}", output_path.display());
    Ok(())
}

/// Extract every URL with at most `concurrency` in flight, writing rows in
/// input order as soon as each prefix of the batch is complete.
async fn run_batch(
    extractor: Arc<FeatureExtractor>,
    urls: impl Iterator<Item = String>,
    concurrency: usize,
    sink: &mut OutputSink,
) -> anyhow::Result<usize> {
    let concurrency = concurrency.max(1);
    let mut extract_set: JoinSet<(usize, String, FeatureVector)> = JoinSet::new();
    let mut in_flight = HashMap::<tokio::task::Id, (usize, String)>::new();
    let mut pending = BTreeMap::<usize, (String, FeatureVector)>::new();
    let mut next_to_write = 0usize;
    let mut written = 0usize;

    for (idx, url) in urls.enumerate() {
        while extract_set.len() >= concurrency {
            if let Some(joined) = extract_set.join_next_with_id().await {
                collect_joined(joined, &mut in_flight, &mut pending);
            }
            written += flush_ready(&mut pending, &mut next_to_write, sink)?;
        }

        let extractor = Arc::clone(&extractor);
        let task_url = url.clone();
        let handle = extract_set.spawn(async move {
            let vector = extractor.extract(&task_url).await;
            (idx, task_url, vector)
        });
        in_flight.insert(handle.id(), (idx, url));
    }

    while let Some(joined) = extract_set.join_next_with_id().await {
        collect_joined(joined, &mut in_flight, &mut pending);
        written += flush_ready(&mut pending, &mut next_to_write, sink)?;
    }
    written += flush_ready(&mut pending, &mut next_to_write, sink)?;
    Ok(written)
}

fn collect_joined(
    joined: Result<(tokio::task::Id, (usize, String, FeatureVector)), tokio::task::JoinError>,
    in_flight: &mut HashMap<tokio::task::Id, (usize, String)>,
    pending: &mut BTreeMap<usize, (String, FeatureVector)>,
) {
    match joined {
        Ok((id, (idx, url, vector))) => {
            in_flight.remove(&id);
            pending.insert(idx, (url, vector));
        }
        Err(err) => {
            // Keep the row so later rows are not held back; every key is zero.
            if let Some((idx, url)) = in_flight.remove(&err.id()) {
                tracing::error!("{url}: extraction task failed: {err}");
                pending.insert(idx, (url, FeatureVectorBuilder::new().build()));
            }
        }
    }
}

fn flush_ready(
    pending: &mut BTreeMap<usize, (String, FeatureVector)>,
    next_to_write: &mut usize,
    sink: &mut OutputSink,
) -> io::Result<usize> {
    let mut written = 0;
    while let Some((url, vector)) = pending.remove(next_to_write) {
        sink.write_row(&url, &vector)?;
        *next_to_write += 1;
        written += 1;
    }
    if written > 0 {
        sink.flush()?;
    }
    Ok(written)
}
