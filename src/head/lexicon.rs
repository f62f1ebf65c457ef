// Fixed word lists used for key generation and attention bonuses.

const VERBS: &[&str] = &["run", "jump", "walk", "eat", "sleep"];
const NOUNS: &[&str] = &["cat", "dog", "house", "car", "book"];

const ANIMAL_WORDS: &[&str] = &["cat", "dog", "bird", "fish"];
const ACTION_WORDS: &[&str] = &["run", "jump", "walk", "fly"];

/// Semantic group embedded in semantic-head keys. Unknown words map to "general".
pub fn semantic_group(token: &str) -> &'static str {
    match token.to_lowercase().as_str() {
        "cat" | "dog" | "bird" => "animal",
        "run" | "jump" | "walk" => "action",
        "red" | "blue" | "green" => "color",
        _ => "general",
    }
}

/// True when the two tokens form a (verb, noun) pair in either order.
pub fn is_syntactically_related(a: &str, b: &str) -> bool {
    (VERBS.contains(&a) && NOUNS.contains(&b)) || (NOUNS.contains(&a) && VERBS.contains(&b))
}

/// True when both tokens are animals or both are actions.
pub fn is_semantically_related(a: &str, b: &str) -> bool {
    (ANIMAL_WORDS.contains(&a) && ANIMAL_WORDS.contains(&b))
        || (ACTION_WORDS.contains(&a) && ACTION_WORDS.contains(&b))
}
