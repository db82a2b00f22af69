//! Ordering of image records

use crate::SortStrategy;
use app_db::ImageRecord;
use rand::seq::SliceRandom;

/// Return a new sequence ordered by `strategy`; the input is left untouched.
///
/// Every strategy except `random` breaks ties by case-insensitive file name.
pub fn sort(records: &[ImageRecord], strategy: SortStrategy) -> Vec<ImageRecord> {
    let mut sorted = records.to_vec();

    if strategy == SortStrategy::Random {
        sorted.shuffle(&mut rand::thread_rng());
        return sorted;
    }

    // Lowercased keys are built once per record
    let mut keyed: Vec<(SortKey, ImageRecord)> = sorted
        .into_iter()
        .map(|record| (SortKey::new(&record, strategy), record))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
    keyed.into_iter().map(|(_, record)| record).collect()
}

/// Sort by a strategy name such as `"rating-desc"`
pub fn sort_by_name(records: &[ImageRecord], name: &str) -> crate::Result<Vec<ImageRecord>> {
    let strategy: SortStrategy = name.parse()?;
    Ok(sort(records, strategy))
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct SortKey {
    primary: Primary,
    filename: String,
    path: String,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Primary {
    None,
    Flag(bool),
    Rating(i16),
    Directory(String),
}

impl SortKey {
    fn new(record: &ImageRecord, strategy: SortStrategy) -> Self {
        let primary = match strategy {
            SortStrategy::Alpha | SortStrategy::Random => Primary::None,
            SortStrategy::Directory => {
                Primary::Directory(record.directory.to_string_lossy().to_lowercase())
            }
            SortStrategy::Unviewed => Primary::Flag(record.viewed),
            SortStrategy::Viewed => Primary::Flag(!record.viewed),
            SortStrategy::Rating => Primary::Rating(i16::from(record.rating)),
            SortStrategy::RatingDesc => Primary::Rating(-i16::from(record.rating)),
        };

        Self {
            primary,
            filename: record.filename.to_lowercase(),
            path: record.path.to_string_lossy().to_lowercase(),
        }
    }
}
