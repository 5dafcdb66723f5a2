//! Basic map search functionality
//!
//! This example demonstrates the fundamental search operations:
//! - Creating a searcher over generated containers
//! - Incremental searches around a viewport
//! - Locality and address queries
//! - Suggestions for short queries

use std::sync::Arc;

use geoquery::{
    MapSearcher, RankedResult, SearchStatus,
    data::{
        MapContainer,
        test_data::{TestDataConfig, generate_city},
    },
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let world = generate_city(&TestDataConfig::default())?;
    let viewport = world.springfield_rect;

    let mut searcher = MapSearcher::builder()
        .container(Arc::new(world.world))
        .containers(world.countries.into_iter().map(|c| Arc::new(c) as Arc<dyn MapContainer>))
        .categories(Arc::new(world.categories))
        .country_info(Arc::new(world.country_info))
        .build()?;
    searcher.set_viewport(viewport, false);
    println!("Viewport region: {}", searcher.pivot_region().unwrap_or("Unknown"));

    // Each keystroke is a new query; the viewport cache is reused between them
    let mut results = Vec::new();
    for typed in ["c", "ca", "caf", "cafe"] {
        searcher.set_query(typed);
        if searcher.search(&mut results, 5) == SearchStatus::Completed {
            println!("\nSearching for '{typed}':");
            print_results(&results, 3);
        }
    }

    println!("\nSearching for 'Springfield museum':");
    searcher.set_query("Springfield museum");
    searcher.search(&mut results, 5);
    print_results(&results, 3);

    println!("\nSearching for 'Springfield Oak Avenue 12':");
    searcher.set_query("Springfield Oak Avenue 12");
    searcher.search(&mut results, 5);
    print_results(&results, 3);

    println!("\nSuggestions for 'ho':");
    searcher.set_query("ho");
    for suggestion in searcher.suggest_strings() {
        println!("  {} -> '{}'", suggestion.name, suggestion.completion);
    }

    Ok(())
}

fn print_results(results: &[RankedResult], limit: usize) {
    for (i, result) in results.iter().take(limit).enumerate() {
        println!(
            "  {}. {} ({:?}) - {:.0} m, rank {}{}",
            i + 1,
            if result.name.is_empty() { "Unnamed" } else { &result.name },
            result.class,
            result.distance_m,
            result.rank,
            result.address.as_deref().map(|a| format!(", {a}")).unwrap_or_default()
        );
    }

    if results.len() > limit {
        println!("  ... and {} more results", results.len() - limit);
    }
}
