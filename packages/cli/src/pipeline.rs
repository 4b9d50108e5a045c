//! The two-pass linkage pipeline.
//!
//! Per pass: ingest and clean both collections, block and match, build
//! the tessellation over the linked points, assign district codes by
//! density, then (second pass) re-match unresolved links inside their
//! district's bounding box and re-run the spatial assignment over the
//! updated links. The final linkage table and cell assignments are
//! exported at the end.

use std::time::Instant;

use placelink_blocking::BlockingIndex;
use placelink_config::{RunConfig, SpatialConfig};
use placelink_ingest::{CleanOptions, IngestOptions, load_alias_table, load_collection};
use placelink_matching::{
    ChunkBuffer, CsvSink, MatchConfig, MatchError, Matcher, SecondPassConfig, run_second_pass,
};
use placelink_models::{FieldSelection, LinkTable, MatchStatus};
use placelink_spatial::{
    AssignConfig, GeometryError, MIN_SITES, RegionAssignment, RegionCell, assign_region_codes,
    build_cells, tessellate,
};
use placelink_tokenize::FrequencyTable;

/// Pipeline failures.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Ingestion failed.
    #[error(transparent)]
    Ingest(#[from] placelink_ingest::IngestError),

    /// A matching round failed.
    #[error(transparent)]
    Match(#[from] MatchError),

    /// The tessellation failed geometrically.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// Link persistence failed.
    #[error(transparent)]
    Sink(#[from] placelink_matching::SinkError),

    /// Cell export failed.
    #[error("cannot write cell assignments: {0}")]
    CellExport(#[from] serde_json::Error),

    /// Output I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs the full pipeline for one configuration.
///
/// # Errors
///
/// Returns a [`PipelineError`] when any stage fails; partial chunk
/// state is never left behind in the linkage output.
pub fn run(config: &RunConfig) -> Result<(), PipelineError> {
    let started = Instant::now();

    // Ingest both collections with identical cleaning.
    let aliases = config
        .input
        .alias_csv
        .as_deref()
        .map(load_alias_table)
        .transpose()?;
    let options = IngestOptions {
        delimiter: config.input.delimiter.and_then(|c| u8::try_from(c).ok()),
        clean: CleanOptions {
            lowercase: config.cleaning.lowercase,
            trim: config.cleaning.trim,
            strip_punctuation: config.cleaning.strip_punctuation,
        },
        aliases,
        extract_house_numbers: config.cleaning.extract_house_numbers,
        collapse_duplicates: config.cleaning.collapse_duplicates,
    };
    let historical = load_collection(&config.input.historical_csv, &options)?;
    let contemporary = load_collection(&config.input.contemporary_csv, &options)?;

    // Round 1, streamed to the linkage CSV in chunks.
    let stage = Instant::now();
    let frequencies = FrequencyTable::build(&historical, FieldSelection::FREQUENCY);
    let blocking = BlockingIndex::build(&contemporary);
    let matcher = Matcher::new(
        &contemporary,
        &blocking,
        &frequencies,
        MatchConfig {
            distance: config.matching.distance,
            threshold: config.matching.threshold,
            query_fields: config.matching.query_fields,
            frequency_limit: config.matching.frequency_limit,
            filter_locality: config.matching.filter_locality,
            filter_town: config.matching.filter_town,
            chunk_size: config.matching.chunk_size,
        },
    );
    let mut sink = CsvSink::create(&config.output.links_csv)?;
    let (mut links, summary) = matcher.run(&historical, &mut sink)?;
    log::info!(
        "round 1: {}/{} matched in {:.1?}",
        summary.matched,
        summary.total,
        stage.elapsed()
    );

    // Spatial disambiguation over the round-1 links.
    let stage = Instant::now();
    let mut outcome = spatial_stage(&mut links, &config.spatial)?;
    log::info!("spatial assignment took {:.1?}", stage.elapsed());

    // Round 2, then a fresh spatial assignment over the updated links.
    if config.second_pass.enabled {
        if let Some((cells, _)) = outcome.take() {
            let stage = Instant::now();
            let second = run_second_pass(
                &mut links,
                &historical,
                &contemporary,
                &cells,
                &SecondPassConfig {
                    distance: config.second_pass.distance,
                    threshold: config.second_pass.threshold,
                    box_method: config.second_pass.box_method,
                    min_token_len: config.second_pass.min_token_len,
                },
            )?;
            log::info!(
                "round 2: {} reassigned, {} unresolved in {:.1?}",
                second.reassigned,
                second.unresolved,
                stage.elapsed()
            );
            outcome = spatial_stage(&mut links, &config.spatial)?;
        } else {
            log::warn!("skipping second pass: no tessellation available");
        }
    }

    export_links(&links, config)?;
    if let (Some(path), Some((cells, assignments))) = (&config.output.cells_json, &outcome) {
        export_cells(cells, assignments, path)?;
    }

    log::info!(
        "pipeline finished in {:.1?}: {} matched, {} reassigned, {} unmatched, {} unresolved",
        started.elapsed(),
        links.count_status(MatchStatus::Matched),
        links.count_status(MatchStatus::SpatiallyReassigned),
        links.count_status(MatchStatus::Unmatched),
        links.count_status(MatchStatus::SpatiallyUnresolved),
    );
    Ok(())
}

/// Tessellates the linked points and assigns district codes.
///
/// Returns `None` (skipping disambiguation) when too few distinct
/// linked coordinates exist to tessellate; other geometric failures
/// abort the stage.
fn spatial_stage(
    links: &mut LinkTable,
    config: &SpatialConfig,
) -> Result<Option<(Vec<RegionCell>, Vec<RegionAssignment>)>, PipelineError> {
    let points = unique_points(links);
    if points.len() < MIN_SITES {
        log::warn!(
            "only {} distinct linked points; skipping spatial disambiguation",
            points.len()
        );
        return Ok(None);
    }

    let tessellation = tessellate(&points, config.tessellation_radius)?;
    let mut cells = build_cells(&tessellation);
    let assignments = assign_region_codes(
        &mut cells,
        links,
        &AssignConfig {
            density_radius: config.density_radius,
            eval_limit: config.eval_limit,
            density_limit: config.density_limit,
        },
    );
    Ok(Some((cells, assignments)))
}

/// Distinct link coordinates, first occurrence first.
///
/// Uniqueness is by coordinate value: several links sharing a point
/// yield one tessellation site.
fn unique_points(links: &LinkTable) -> Vec<(f64, f64)> {
    let mut seen = std::collections::BTreeSet::new();
    let mut points = Vec::new();
    for link in links {
        if let Some((x, y)) = link.coord() {
            if seen.insert((x.to_bits(), y.to_bits())) {
                points.push((x, y));
            }
        }
    }
    points
}

/// One exported tessellation cell: assignment outcome plus boundary
/// geometry for inspection.
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct CellFeature<'a> {
    cell: usize,
    region: Option<&'a str>,
    density: f64,
    boundary: Vec<[f64; 2]>,
}

/// Writes cell assignments with their polygon boundaries as JSON.
fn export_cells(
    cells: &[RegionCell],
    assignments: &[RegionAssignment],
    path: &std::path::Path,
) -> Result<(), PipelineError> {
    let features: Vec<CellFeature<'_>> = cells
        .iter()
        .zip(assignments)
        .map(|(cell, assignment)| CellFeature {
            cell: cell.id,
            region: cell.region.as_deref(),
            density: assignment.density,
            boundary: cell
                .polygon
                .exterior()
                .coords()
                .map(|c| [c.x, c.y])
                .collect(),
        })
        .collect();
    std::fs::write(path, serde_json::to_vec_pretty(&features)?)?;
    log::info!("wrote {} cells to {}", features.len(), path.display());
    Ok(())
}

/// Rewrites the final linkage table, chunked like the round-1 stream.
fn export_links(links: &LinkTable, config: &RunConfig) -> Result<(), PipelineError> {
    let mut sink = CsvSink::create(&config.output.links_csv)?;
    let mut buffer = ChunkBuffer::new(&mut sink, config.matching.chunk_size);
    for link in links {
        buffer.push(link.clone())?;
    }
    buffer.finish()?;
    log::info!(
        "wrote {} links to {}",
        links.len(),
        config.output.links_csv.display()
    );
    Ok(())
}
