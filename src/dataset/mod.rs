use crate::{
    config::Config,
    error::{ApiError, Result},
    ml::EmbeddingTable,
    models::Wine,
};
use csv::ReaderBuilder;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::HashMap,
    fs,
    fs::File,
    path::PathBuf,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Versioned so a format change invalidates older snapshots.
const CACHE_FILE_NAME: &str = "wine_dataset_v3.json";

const FETCH_TIMEOUT_SECONDS: u64 = 30;
const CONNECT_TIMEOUT_SECONDS: u64 = 10;

/// Raw CSV row before validation. Field names follow the common wine
/// dataset exports, with aliases for the capitalized variants.
#[derive(Debug, Deserialize)]
struct WineCsvRecord {
    #[serde(alias = "ID", alias = "index", alias = "number")]
    id: Option<String>,
    #[serde(alias = "Title")]
    title: Option<String>,
    #[serde(alias = "Name")]
    name: Option<String>,
    #[serde(alias = "Variety")]
    variety: Option<String>,
    #[serde(alias = "Country")]
    country: Option<String>,
    #[serde(alias = "region_1", alias = "province", alias = "Region")]
    region: Option<String>,
    #[serde(alias = "Winery")]
    winery: Option<String>,
    #[serde(alias = "Price")]
    price: Option<String>,
    #[serde(alias = "rating", alias = "score", alias = "Points")]
    points: Option<String>,
    #[serde(alias = "Description")]
    description: Option<String>,
    flavor_profile: Option<String>,
    body: Option<String>,
    tannins: Option<String>,
    acidity: Option<String>,
    aroma: Option<String>,
    pairing_suggestions: Option<String>,
}

/// The loaded catalog plus its optional precomputed vectors.
pub struct Dataset {
    pub wines: Vec<Wine>,
    pub embeddings: Option<EmbeddingTable>,
}

/// Cached form of a loaded dataset. Embedding rows are stored already
/// aligned to the wine list so the table can be rebuilt directly.
#[derive(Serialize, Deserialize)]
struct DatasetSnapshot {
    wines: Vec<Wine>,
    embeddings: Option<Vec<Option<Vec<f32>>>>,
    timestamp: u64,
}

/// Loads the wine catalog and its embeddings from the configured
/// sources, with a file cache in front and a built-in sample catalog
/// as the last resort. Loading never fails the application: every
/// problem degrades to a smaller dataset with a logged warning.
pub struct DatasetLoader {
    config: Config,
    client: reqwest::Client,
}

impl DatasetLoader {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECONDS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECONDS))
            .build()?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    pub async fn load(&self) -> Result<Dataset> {
        if let Some(snapshot) = self.read_cache() {
            let ids: Vec<u32> = snapshot.wines.iter().map(|w| w.id).collect();
            let embeddings = snapshot
                .embeddings
                .and_then(|rows| EmbeddingTable::build(&ids, rows));
            info!(
                "Loaded {} wines from cache, embeddings for {}",
                snapshot.wines.len(),
                embeddings.as_ref().map_or(0, |t| t.coverage())
            );
            return Ok(Dataset {
                wines: snapshot.wines,
                embeddings,
            });
        }

        let wines = match self.load_wines().await {
            Ok(Some(wines)) if !wines.is_empty() => wines,
            Ok(Some(_)) => {
                warn!("Wine data source yielded no records, using the sample catalog");
                return Ok(Self::sample_dataset());
            }
            Ok(None) => {
                info!("No wine data source configured, using the sample catalog");
                return Ok(Self::sample_dataset());
            }
            Err(e) => {
                warn!("Failed to load wine data ({}), using the sample catalog", e);
                return Ok(Self::sample_dataset());
            }
        };

        let ids: Vec<u32> = wines.iter().map(|w| w.id).collect();
        let rows = self.load_embedding_rows(&ids).await;
        self.write_cache(&wines, &rows);

        let embeddings = rows.and_then(|aligned| EmbeddingTable::build(&ids, aligned));
        info!(
            "Wine dataset ready: {} records, embeddings for {}",
            wines.len(),
            embeddings.as_ref().map_or(0, |t| t.coverage())
        );

        Ok(Dataset { wines, embeddings })
    }

    fn sample_dataset() -> Dataset {
        Dataset {
            wines: sample_wines(),
            embeddings: None,
        }
    }

    async fn load_wines(&self) -> Result<Option<Vec<Wine>>> {
        let max_records = self.config.max_records;

        if let Some(path) = &self.config.wine_data_path {
            info!("Reading wine data from {}", path);
            let file = File::open(path)?;
            return read_wines_from_csv(file, max_records).map(Some);
        }

        if let Some(url) = &self.config.wine_data_url {
            info!("Fetching wine data from {}", url);
            let text = self.fetch_text(url).await?;
            return read_wines_from_csv(text.as_bytes(), max_records).map(Some);
        }

        Ok(None)
    }

    /// Embedding problems never fail the load; the ranker falls back to
    /// keyword scoring when the table is absent.
    async fn load_embedding_rows(&self, ids: &[u32]) -> Option<Vec<Option<Vec<f32>>>> {
        let raw = match self.load_embeddings_json().await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to load embeddings ({}), continuing without them", e);
                return None;
            }
        };

        match parse_embedding_rows(&raw) {
            Some(rows) => Some(align_embeddings(rows, ids)),
            None => {
                warn!("Unrecognized embeddings file format, continuing without embeddings");
                None
            }
        }
    }

    async fn load_embeddings_json(&self) -> Result<Option<Value>> {
        if let Some(path) = &self.config.embeddings_path {
            info!("Reading embeddings from {}", path);
            let text = fs::read_to_string(path)?;
            return Ok(Some(serde_json::from_str(&text)?));
        }

        if let Some(url) = &self.config.embeddings_url {
            info!("Fetching embeddings from {}", url);
            let text = self.fetch_text(url).await?;
            return Ok(Some(serde_json::from_str(&text)?));
        }

        Ok(None)
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(ApiError::DatasetError(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        Ok(response.text().await?)
    }

    fn cache_path(&self) -> PathBuf {
        PathBuf::from(&self.config.cache_dir).join(CACHE_FILE_NAME)
    }

    fn read_cache(&self) -> Option<DatasetSnapshot> {
        let path = self.cache_path();
        let text = fs::read_to_string(&path).ok()?;

        let snapshot: DatasetSnapshot = match serde_json::from_str(&text) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Ignoring unreadable dataset cache at {}: {}", path.display(), e);
                return None;
            }
        };

        if snapshot.wines.is_empty() {
            return None;
        }

        if !snapshot_is_fresh(snapshot.timestamp, unix_now(), self.config.cache_ttl_secs) {
            debug!("Dataset cache at {} has expired", path.display());
            return None;
        }

        Some(snapshot)
    }

    /// Best effort: a cache that cannot be written only costs the next
    /// startup a reload.
    fn write_cache(&self, wines: &[Wine], embeddings: &Option<Vec<Option<Vec<f32>>>>) {
        let snapshot = DatasetSnapshot {
            wines: wines.to_vec(),
            embeddings: embeddings.clone(),
            timestamp: unix_now(),
        };

        if let Err(e) = fs::create_dir_all(&self.config.cache_dir) {
            warn!(
                "Could not create cache dir {}: {}",
                self.config.cache_dir, e
            );
            return;
        }

        let json = match serde_json::to_string(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                warn!("Could not serialize dataset cache: {}", e);
                return;
            }
        };

        let path = self.cache_path();
        match fs::write(&path, json) {
            Ok(()) => debug!("Dataset cache written to {}", path.display()),
            Err(e) => warn!("Could not write dataset cache at {}: {}", path.display(), e),
        }
    }
}

/// Reads wines from CSV, keeping at most `max_records` rows. Rows that
/// fail to parse or carry no usable title are skipped with a log line
/// rather than failing the whole file.
pub fn read_wines_from_csv<R: std::io::Read>(reader: R, max_records: usize) -> Result<Vec<Wine>> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut wines = Vec::new();
    let mut record_count = 0usize;
    let mut skipped_count = 0usize;

    for result in rdr.deserialize() {
        if record_count >= max_records {
            debug!("Row cap of {} reached, ignoring remaining rows", max_records);
            break;
        }
        record_count += 1;

        let record: WineCsvRecord = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping unparseable row {}: {}", record_count, e);
                skipped_count += 1;
                continue;
            }
        };

        match validate_wine_record(record_count, record) {
            Some(wine) => wines.push(wine),
            None => skipped_count += 1,
        }
    }

    info!(
        "CSV parsing complete: {} rows read, {} wines, {} skipped",
        record_count,
        wines.len(),
        skipped_count
    );

    Ok(wines)
}

/// Turns a raw CSV row into a catalog record. `row` is the 1-based data
/// row position; it seeds the id when the source has none and the
/// placeholder price/rating. Rows without any usable title are dropped.
fn validate_wine_record(row: usize, record: WineCsvRecord) -> Option<Wine> {
    let description = record
        .description
        .map(|d| d.trim().to_string())
        .unwrap_or_default();

    let title = record
        .title
        .or(record.name)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| truncated_title(&description))?;

    let id = record
        .id
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|id| *id > 0)
        .unwrap_or(row as u32);

    let price = record
        .price
        .and_then(|v| v.trim().parse::<f32>().ok())
        .filter(|p| *p > 0.0)
        .unwrap_or_else(|| placeholder_price(row));

    let rating = record
        .points
        .and_then(|v| v.trim().parse::<f32>().ok())
        .filter(|r| *r > 0.0)
        .unwrap_or_else(|| placeholder_rating(row));

    Some(Wine {
        id,
        title,
        variety: clean_field(record.variety),
        country: clean_field(record.country),
        region: clean_field(record.region),
        winery: clean_field(record.winery),
        price,
        rating,
        description,
        flavor_profile: clean_field(record.flavor_profile),
        body: clean_field(record.body),
        tannins: clean_field(record.tannins),
        acidity: clean_field(record.acidity),
        aroma: clean_field(record.aroma),
        pairing_suggestions: clean_field(record.pairing_suggestions),
    })
}

fn clean_field(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Title fallback built from the first 50 characters of the description.
fn truncated_title(description: &str) -> Option<String> {
    if description.is_empty() {
        return None;
    }

    let mut prefix: String = description.chars().take(50).collect();
    if description.chars().count() > 50 {
        prefix.push_str("...");
    }
    Some(prefix)
}

/// Stand-in price for rows missing one, spread across [20, 120).
fn placeholder_price(row: usize) -> f32 {
    20.0 + ((row * 37) % 100) as f32
}

/// Stand-in rating for rows missing one, spread across [80, 100).
fn placeholder_rating(row: usize) -> f32 {
    80.0 + ((row * 13) % 20) as f32
}

enum EmbeddingRows {
    Positional(Vec<Option<Vec<f32>>>),
    ById(HashMap<u32, Vec<f32>>),
}

/// Accepts the embedding file shapes seen in the wild: a bare array of
/// vectors, the same array under an `embeddings` or `data` key, or an
/// object keyed by record id. Anything else is an unknown format.
fn parse_embedding_rows(value: &Value) -> Option<EmbeddingRows> {
    match value {
        Value::Array(rows) => Some(EmbeddingRows::Positional(
            rows.iter().map(vector_from_value).collect(),
        )),
        Value::Object(map) => {
            if let Some(inner) = map.get("embeddings").or_else(|| map.get("data")) {
                return parse_embedding_rows(inner);
            }

            let mut by_id = HashMap::new();
            for (key, row) in map {
                let id = key.trim().parse::<u32>().ok()?;
                if let Some(vector) = vector_from_value(row) {
                    by_id.insert(id, vector);
                }
            }
            if by_id.is_empty() {
                None
            } else {
                Some(EmbeddingRows::ById(by_id))
            }
        }
        _ => None,
    }
}

fn vector_from_value(value: &Value) -> Option<Vec<f32>> {
    let numbers = value.as_array()?;

    let mut vector = Vec::with_capacity(numbers.len());
    for number in numbers {
        vector.push(number.as_f64()? as f32);
    }

    if vector.is_empty() {
        None
    } else {
        Some(vector)
    }
}

/// Lines the rows up with the catalog: positional rows map by index and
/// are padded or truncated to the catalog size, id-keyed rows map by id.
/// A record without a row simply has no embedding.
fn align_embeddings(rows: EmbeddingRows, ids: &[u32]) -> Vec<Option<Vec<f32>>> {
    match rows {
        EmbeddingRows::Positional(mut rows) => {
            if rows.len() != ids.len() {
                warn!(
                    "Embedding row count {} differs from catalog size {}",
                    rows.len(),
                    ids.len()
                );
            }
            rows.resize_with(ids.len(), || None);
            rows
        }
        EmbeddingRows::ById(mut by_id) => ids.iter().map(|id| by_id.remove(id)).collect(),
    }
}

/// A snapshot is fresh while its age stays under the TTL.
fn snapshot_is_fresh(timestamp: u64, now: u64, ttl_secs: u64) -> bool {
    now.saturating_sub(timestamp) < ttl_secs
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Built-in catalog used when no data source is configured or loading
/// fails. A small curated tasting list keeps the API usable offline.
pub fn sample_wines() -> Vec<Wine> {
    vec![
        Wine {
            id: 1,
            title: "Cabernet Sauvignon Reserve 2018".to_string(),
            variety: Some("Cabernet Sauvignon".to_string()),
            country: Some("France".to_string()),
            region: Some("Bordeaux".to_string()),
            winery: Some("Château Margaux".to_string()),
            price: 125.99,
            rating: 96.0,
            description: "A rich, full-bodied red wine with notes of black currant, \
                          dark cherry, and hints of oak. Excellent aging potential."
                .to_string(),
            flavor_profile: Some("Bold and structured".to_string()),
            body: Some("Full".to_string()),
            tannins: Some("High".to_string()),
            acidity: Some("Medium".to_string()),
            aroma: Some("Black fruits, tobacco, vanilla".to_string()),
            pairing_suggestions: Some("Steak, lamb, aged cheeses".to_string()),
        },
        Wine {
            id: 2,
            title: "Chardonnay Barrel Select 2020".to_string(),
            variety: Some("Chardonnay".to_string()),
            country: Some("USA".to_string()),
            region: Some("California".to_string()),
            winery: Some("Napa Valley Winery".to_string()),
            price: 45.50,
            rating: 92.0,
            description: "Creamy white wine with citrus notes and a smooth vanilla \
                          finish from oak aging."
                .to_string(),
            flavor_profile: Some("Buttery and rich".to_string()),
            body: Some("Medium".to_string()),
            tannins: None,
            acidity: Some("Medium-High".to_string()),
            aroma: Some("Citrus, pear, vanilla".to_string()),
            pairing_suggestions: Some("Seafood, chicken, creamy pasta".to_string()),
        },
        Wine {
            id: 3,
            title: "Pinot Noir Elegance 2019".to_string(),
            variety: Some("Pinot Noir".to_string()),
            country: Some("Italy".to_string()),
            region: Some("Tuscany".to_string()),
            winery: Some("Antinori".to_string()),
            price: 68.0,
            rating: 93.0,
            description: "Elegant and silky red wine with red berry flavors and \
                          subtle spice notes."
                .to_string(),
            flavor_profile: Some("Delicate and aromatic".to_string()),
            body: Some("Light".to_string()),
            tannins: Some("Low".to_string()),
            acidity: None,
            aroma: Some("Red berries, rose, spice".to_string()),
            pairing_suggestions: Some("Duck, mushroom dishes, salmon".to_string()),
        },
        Wine {
            id: 4,
            title: "Sauvignon Blanc Fresh 2021".to_string(),
            variety: Some("Sauvignon Blanc".to_string()),
            country: Some("New Zealand".to_string()),
            region: Some("Marlborough".to_string()),
            winery: Some("Cloudy Bay".to_string()),
            price: 32.99,
            rating: 90.0,
            description: "Crisp and refreshing white wine with vibrant grapefruit \
                          and herbaceous notes."
                .to_string(),
            flavor_profile: Some("Zesty and crisp".to_string()),
            body: Some("Light".to_string()),
            tannins: None,
            acidity: Some("High".to_string()),
            aroma: Some("Grapefruit, lime, cut grass".to_string()),
            pairing_suggestions: Some("Goat cheese, salads, seafood".to_string()),
        },
        Wine {
            id: 5,
            title: "Merlot Classic 2017".to_string(),
            variety: Some("Merlot".to_string()),
            country: Some("Chile".to_string()),
            region: Some("Maipo Valley".to_string()),
            winery: Some("Concha y Toro".to_string()),
            price: 28.50,
            rating: 89.0,
            description: "Smooth and approachable red wine with plum and chocolate \
                          notes."
                .to_string(),
            flavor_profile: Some("Soft and fruity".to_string()),
            body: Some("Medium".to_string()),
            tannins: Some("Medium".to_string()),
            acidity: None,
            aroma: Some("Plum, black cherry, chocolate".to_string()),
            pairing_suggestions: Some("Pizza, pasta, grilled meats".to_string()),
        },
    ]
}
