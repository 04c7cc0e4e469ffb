// src/portfolio/seed.rs
use crate::types::{GenerationRecord, LocalReference, PortfolioCollection, PROCESS_START_MS};

/// Demo content shown when no portfolio has been stored yet, newest first
pub fn seed_collection() -> PortfolioCollection {
    let start = *PROCESS_START_MS;
    vec![
        GenerationRecord {
            id: "demo1".to_string(),
            source_locator: LocalReference::new(
                "https://storage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4",
            ),
            prompt: "A friendly giant rabbit in a mystical forest".to_string(),
            notes: "Dette er en demo-video som viser hvordan formatet fungerer. I en undervisningskontekst ville vi her forklart valg av stilistiske elementer og lyssetting.".to_string(),
            created_at: start - 100_000,
        },
        GenerationRecord {
            id: "demo2".to_string(),
            source_locator: LocalReference::new(
                "https://storage.googleapis.com/gtv-videos-bucket/sample/ElephantsDream.mp4",
            ),
            prompt: "Surreal clockwork machinery landscape".to_string(),
            notes: "Fokus på industriell design og surrealisme. Her diskuterer vi hvordan AI tolker abstrakte mekaniske konsepter.".to_string(),
            created_at: start - 200_000,
        },
    ]
}
