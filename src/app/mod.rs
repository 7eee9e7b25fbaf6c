use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use phishfeat::features::FeatureVectorBuilder;
use phishfeat::{ExtractorConfig, FeatureExtractor, FeatureVector, SCHEMA};
use serde::Serialize;
use tokio::task::JoinSet;

include!("types.rs");
include!("data_io.rs");
include!("runtime.rs");
