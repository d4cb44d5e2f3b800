// Story listing: free-text search filter and trending order.

use crate::db::Story;

pub const DEFAULT_TRENDING_LIMIT: usize = 5;

/// Case-insensitive substring match on title, author, description, or genre.
pub fn matches_term(story: &Story, term: &str) -> bool {
    let needle = term.to_lowercase();
    [
        &story.title,
        &story.author,
        &story.description,
        &story.genre,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&needle))
}

/// Keep stories matching `term`, preserving retrieval order. An empty term
/// keeps everything.
pub fn filter_stories(stories: Vec<Story>, term: &str) -> Vec<Story> {
    if term.is_empty() {
        return stories;
    }
    stories
        .into_iter()
        .filter(|s| matches_term(s, term))
        .collect()
}

/// Most-liked first. `sort_by` is stable, so ties keep retrieval order.
pub fn trending(mut stories: Vec<Story>, limit: usize) -> Vec<Story> {
    stories.sort_by(|a, b| b.likes.cmp(&a.likes));
    stories.truncate(limit);
    stories
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(id: i64, title: &str, author: &str, genre: &str, likes: i64) -> Story {
        Story {
            id,
            title: title.to_string(),
            author: author.to_string(),
            genre: genre.to_string(),
            description: format!("about {title}"),
            duration: "5".to_string(),
            story: String::new(),
            likes,
            liked_by: Vec::new(),
            creator_id: None,
            created_at: String::new(),
        }
    }

    fn sample() -> Vec<Story> {
        vec![
            story(1, "The Dragon Keep", "Ana", "Fantasy", 3),
            story(2, "Night Shift", "Bo", "Horror", 7),
            story(3, "Star Drift", "Cy", "Sci-Fi", 3),
            story(4, "Quiet Harbor", "dragonfly", "Drama", 0),
        ]
    }

    #[test]
    fn test_filter_is_case_insensitive_substring() {
        let ids: Vec<i64> = filter_stories(sample(), "DRAGON")
            .iter()
            .map(|s| s.id)
            .collect();
        // title match and author match; "Drama" does not contain "dragon"
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn test_filter_matches_genre_and_description() {
        assert_eq!(filter_stories(sample(), "sci-fi").len(), 1);
        assert_eq!(filter_stories(sample(), "about night").len(), 1);
        assert!(filter_stories(sample(), "zebra").is_empty());
    }

    #[test]
    fn test_filter_iff_property() {
        let terms = ["a", "Drift", "harbor", "o", "xyz", "FANT"];
        for term in terms {
            let kept: Vec<i64> = filter_stories(sample(), term).iter().map(|s| s.id).collect();
            for s in sample() {
                let lower = term.to_lowercase();
                let expected = [&s.title, &s.author, &s.description, &s.genre]
                    .iter()
                    .any(|f| f.to_lowercase().contains(&lower));
                assert_eq!(kept.contains(&s.id), expected, "term {term:?} story {}", s.id);
            }
        }
    }

    #[test]
    fn test_empty_term_keeps_all() {
        assert_eq!(filter_stories(sample(), "").len(), 4);
    }

    #[test]
    fn test_trending_desc_with_stable_ties() {
        let ids: Vec<i64> = trending(sample(), 10).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 1, 3, 4]);
    }

    #[test]
    fn test_trending_truncates() {
        let top = trending(sample(), 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].id, 2);
        assert_eq!(top[1].id, 1);
    }
}
