//! Epigraph App - dataset inspection entry point
//!
//! Loads the configured training split, builds the lockstep batch streams
//! and reports their size and graph statistics.

use std::process::ExitCode;

use epigraph_data::setting::SETTING_FILENAME;
use epigraph_data::utility::get_file_path;
use epigraph_data::{init_logger, DatasetSetting, DirectorySource, GraphDataset, Logger, Result, Segment};

fn run(logger: &Logger) -> Result<()> {
    let setting_path = get_file_path(SETTING_FILENAME);
    let setting = if setting_path.exists() {
        DatasetSetting::load(&setting_path)?
    } else {
        DatasetSetting::default()
    };
    init_logger(&setting.log)?;
    logger.info(&format!("Epigraph {} starting", epigraph_data::VERSION));

    let source = DirectorySource::new(setting.datapath.clone(), setting.dataset.clone());
    let mut dataset = GraphDataset::new(setting, source)?;
    let mut loaders = dataset.load_train_data(Segment::Train)?;

    logger.info(&format!(
        "{} batches per epoch over {} regions, {} features",
        loaders.num_batch,
        loaders.num_states,
        dataset.num_features()
    ));

    for (step, batch) in loaders.encoder.by_ref().take(loaders.num_batch).enumerate() {
        logger.debug(&format!(
            "batch {}: {} graphs, {} nodes, {} edges",
            step,
            batch.num_graphs(),
            batch.num_nodes(),
            batch.num_edges()
        ));
    }
    Ok(())
}

fn main() -> ExitCode {
    let logger = Logger::new("EpigraphApp");
    match run(&logger) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logger.error(&format!("dataset load failed: {}", e));
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
