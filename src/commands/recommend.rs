use anyhow::{Context, Result};

use affinity::config::Config;
use affinity::server::RecommendationResponse;

pub fn execute(config: &Config, user_id: &str, limit: i64, include_own: bool, json: bool) -> Result<()> {
    let service = super::open_service(config)?;
    let result = service
        .recommend(user_id, limit, !include_own)
        .with_context(|| format!("Failed to recommend for {}", user_id))?;

    if json {
        let response = RecommendationResponse::from(result.as_ref());
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if result.items.is_empty() {
        println!("No recommendations for {}", user_id);
        return Ok(());
    }

    println!("Recommendations for {} ({} items)", user_id, result.items.len());
    for (rank, scored) in result.items.iter().enumerate() {
        let item = &scored.item;
        println!(
            "{:>3}. [{:>6.3}] #{} by {}: {}",
            rank + 1,
            scored.score,
            item.id,
            item.author_id,
            preview(&item.text, 72)
        );
    }
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::preview;

    #[test]
    fn test_preview_flattens_and_cuts() {
        assert_eq!(preview("a\n  b", 10), "a b");
        assert_eq!(preview("abcdef", 3), "abc...");
    }
}
