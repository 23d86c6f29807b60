//! Seams for the external collaborators which supply map data, elevations
//! and geocoding results. No network clients live in this crate; callers
//! provide their own implementations of these traits. Wrappers are provided
//! which put any implementation behind the file-backed ValueCache.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use indicatif::ProgressBar;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::common::config::EngineSettings;
use crate::common::error::{GraphError, ProviderError};
use crate::loading::cache::ValueCache;
use crate::loading::petgraph::RoadGraph;
use crate::loading::structs::MapData;

pub const DEFAULT_ELEVATION_BATCH: usize = 100;

/// Area of the road network to be retrieved from a map provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MapQuery {
    /// Everything within a named city
    Place { city: String, country: String },
    /// Everything within `dist` metres of a point
    Point { lat: f64, lon: f64, dist: f64 },
    /// Everything needed to travel between two (lat, lon) points
    Span { start: (f64, f64), end: (f64, f64) },
}

impl MapQuery {
    /// Cache dataset which results for this query are stored under
    pub fn dataset(&self) -> &'static str {
        match self {
            MapQuery::Place { .. } => "city_map",
            MapQuery::Point { .. } | MapQuery::Span { .. } => "map",
        }
    }
}

pub trait MapProvider: Send + Sync {
    fn fetch(&self, query: &MapQuery) -> Result<MapData, ProviderError>;
}

pub trait ElevationProvider: Send + Sync {
    /// Elevation in metres for each (lat, lon) pair, in the order provided
    fn fetch_batch(
        &self,
        coords: &[(f64, f64)],
    ) -> Result<Vec<f64>, ProviderError>;
}

pub trait Geocoder: Send + Sync {
    /// Resolve a free-text place name into a (lat, lon) pair
    fn geocode(&self, place: &str) -> Result<(f64, f64), ProviderError>;
}

/// Map provider backed by a single JSON file on disk containing a MapData
/// object. The same network is returned for every query.
#[derive(Debug, Clone)]
pub struct JsonFileMapProvider {
    path: PathBuf,
}

impl JsonFileMapProvider {
    pub fn new(path: impl Into<PathBuf>) -> JsonFileMapProvider {
        JsonFileMapProvider { path: path.into() }
    }

    /// Read the whole network from the file
    pub fn load(&self) -> Result<MapData, ProviderError> {
        debug!(path = %self.path.display(), "reading map file");
        let reader = BufReader::new(File::open(&self.path)?);
        let map: MapData = serde_json::from_reader(reader)?;
        info!(
            nodes = map.nodes.len(),
            edges = map.edges.len(),
            "loaded map data"
        );
        Ok(map)
    }
}

impl MapProvider for JsonFileMapProvider {
    fn fetch(&self, query: &MapQuery) -> Result<MapData, ProviderError> {
        debug!(?query, "map file holds a single network, query ignored");
        self.load()
    }
}

/// Consults the cache before falling through to the wrapped provider.
/// Successful responses are stored; failures are passed back untouched.
#[derive(Debug, Clone)]
pub struct CachedMapProvider<P> {
    inner: P,
    cache: ValueCache,
}

impl<P: MapProvider> CachedMapProvider<P> {
    pub fn new(inner: P, cache: ValueCache) -> CachedMapProvider<P> {
        CachedMapProvider { inner, cache }
    }
}

impl<P: MapProvider> MapProvider for CachedMapProvider<P> {
    fn fetch(&self, query: &MapQuery) -> Result<MapData, ProviderError> {
        let dataset = query.dataset();
        if let Some(map) = self.cache.lookup(dataset, query) {
            return Ok(map);
        }

        let map = self.inner.fetch(query)?;
        self.cache.store(dataset, query, &map);
        Ok(map)
    }
}

#[derive(Debug, Clone)]
pub struct CachedGeocoder<G> {
    inner: G,
    cache: ValueCache,
}

impl<G: Geocoder> CachedGeocoder<G> {
    pub fn new(inner: G, cache: ValueCache) -> CachedGeocoder<G> {
        CachedGeocoder { inner, cache }
    }
}

impl<G: Geocoder> Geocoder for CachedGeocoder<G> {
    fn geocode(&self, place: &str) -> Result<(f64, f64), ProviderError> {
        if let Some(coords) = self.cache.lookup("geocode", place) {
            return Ok(coords);
        }

        let coords = self.inner.geocode(place)?;
        self.cache.store("geocode", place, &coords);
        Ok(coords)
    }
}

#[derive(Serialize)]
struct ElevationParams<'a> {
    coords: &'a [(f64, f64)],
    batch_size: usize,
}

/// Fetch a single batch, substituting zeros if the provider fails or sends
/// back the wrong number of samples. The flag reports whether the batch was
/// served in full
fn fetch_one_batch<P: ElevationProvider + ?Sized>(
    provider: &P,
    batch: &[(f64, f64)],
) -> (Vec<f64>, bool) {
    match provider.fetch_batch(batch) {
        Ok(elevations) if elevations.len() == batch.len() => (elevations, true),
        Ok(elevations) => {
            warn!(
                expected = batch.len(),
                received = elevations.len(),
                "elevation batch returned the wrong number of samples, using 0"
            );
            (vec![0.0; batch.len()], false)
        }
        Err(err) => {
            warn!(
                error = %err,
                size = batch.len(),
                "elevation batch failed, using 0"
            );
            (vec![0.0; batch.len()], false)
        }
    }
}

/// Look up the elevation of every coordinate, in the order provided. Batches
/// are fetched concurrently on the rayon pool. A batch which fails is filled
/// with zeros rather than aborting the lookup. When a cache is provided, the
/// full result is read from and written to the `elevations` dataset; results
/// containing a failed batch are not stored.
pub fn fetch_elevations<P: ElevationProvider + ?Sized>(
    provider: &P,
    coords: &[(f64, f64)],
    batch_size: usize,
    cache: Option<&ValueCache>,
) -> Vec<f64> {
    if coords.is_empty() {
        return Vec::new();
    }

    let batch_size = batch_size.max(1);
    let params = ElevationParams { coords, batch_size };

    if let Some(cached) = cache
        .and_then(|cache| cache.lookup::<_, Vec<f64>>("elevations", &params))
    {
        if cached.len() == coords.len() {
            return cached;
        }
        warn!(
            expected = coords.len(),
            received = cached.len(),
            "ignoring cached elevations of the wrong length"
        );
    }

    let n_batches = coords.len().div_ceil(batch_size);
    info!(coords = coords.len(), batches = n_batches, "fetching elevations");
    let bar = ProgressBar::new(n_batches as u64);

    let mut results: Vec<(Vec<f64>, bool)> = Vec::new();
    coords
        .par_chunks(batch_size)
        .map(|batch| {
            let result = fetch_one_batch(provider, batch);
            bar.inc(1);
            result
        })
        .collect_into_vec(&mut results);

    bar.finish();

    let complete = results.iter().all(|(_, ok)| *ok);
    let elevations: Vec<f64> = results
        .into_iter()
        .flat_map(|(batch, _)| batch.into_iter())
        .collect();

    if let Some(cache) = cache {
        if complete {
            cache.store("elevations", &params, &elevations);
        } else {
            debug!("not caching elevations, one or more batches failed");
        }
    }

    elevations
}

/// Fetch elevations for every node in the graph, keyed by node id
pub fn elevation_map<P: ElevationProvider + ?Sized>(
    graph: &RoadGraph,
    provider: &P,
    batch_size: usize,
    cache: Option<&ValueCache>,
) -> FxHashMap<i64, f64> {
    let nodes = graph.node_coords();
    let coords: Vec<(f64, f64)> =
        nodes.iter().map(|(_, lat, lon)| (*lat, *lon)).collect();

    let elevations = fetch_elevations(provider, &coords, batch_size, cache);

    nodes
        .into_iter()
        .zip(elevations)
        .map(|((id, _, _), ele)| (id, ele))
        .collect()
}

/// Fetch elevations for every node in the graph and apply them, which also
/// recomputes every edge slope
pub fn load_elevations<P: ElevationProvider + ?Sized>(
    graph: &mut RoadGraph,
    provider: &P,
    batch_size: usize,
    cache: Option<&ValueCache>,
) -> Result<(), GraphError> {
    if graph.elevations_assigned() {
        return Err(GraphError::ElevationsAlreadyAssigned);
    }
    let elevations = elevation_map(graph, provider, batch_size, cache);
    graph.assign_elevations(&elevations)
}

/// Build the road graph for a query. Map data is served from the value cache
/// in the configured cache directory where possible. When an elevation
/// provider is supplied, elevations are fetched in batches of the configured
/// size, through the same cache, and every slope is recomputed
pub fn load_road_graph<M: MapProvider>(
    maps: M,
    query: &MapQuery,
    elevations: Option<&dyn ElevationProvider>,
    settings: &EngineSettings,
) -> Result<RoadGraph, ProviderError> {
    let cache = ValueCache::new(settings.cache_dir.clone());
    let maps = CachedMapProvider::new(maps, cache.clone());

    let mut graph = RoadGraph::new(maps.fetch(query)?);

    match elevations {
        Some(provider) => load_elevations(
            &mut graph,
            provider,
            settings.elevation_batch,
            Some(&cache),
        )?,
        None => debug!("no elevation provider, keeping map elevations"),
    }

    info!(?query, "road graph ready");
    Ok(graph)
}
