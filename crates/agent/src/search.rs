use vendi_core::domain::inventory::InventoryItem;

const MAX_QUERY_TERMS: usize = 4;

/// Words that carry no product signal in a commerce query: articles,
/// pronouns, and the generic commerce vocabulary of the request itself.
const STOP_WORDS: &[&str] = &[
    "is", "are", "the", "a", "an", "to", "in", "on", "for", "of", "with", "and", "or", "have",
    "has", "do", "you", "i", "we", "me", "my", "our", "inventory", "available", "stock", "catalog",
    "products", "product", "list", "show",
];

/// Lowercase alphanumeric search terms worth matching on, stop words
/// removed, capped at the first [`MAX_QUERY_TERMS`].
pub fn query_terms(user_query: &str) -> Vec<String> {
    let text = user_query.to_lowercase();
    let mut terms = Vec::new();

    for token in text.split(|character: char| !character.is_ascii_alphanumeric()) {
        if token.is_empty() || STOP_WORDS.contains(&token) {
            continue;
        }
        terms.push(token.to_owned());
        if terms.len() == MAX_QUERY_TERMS {
            break;
        }
    }

    terms
}

/// An item matches when every retained term is a substring of its lowercase
/// name and description. With no usable terms, everything matches. Pure;
/// store order is preserved.
pub fn filter_items(items: &[InventoryItem], user_query: &str) -> Vec<InventoryItem> {
    let terms = query_terms(user_query);
    if terms.is_empty() {
        return items.to_vec();
    }

    items
        .iter()
        .filter(|item| {
            let haystack = format!("{} {}", item.name, item.description).to_lowercase();
            terms.iter().all(|term| haystack.contains(term.as_str()))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use vendi_core::domain::article::ArticleId;
    use vendi_core::domain::inventory::InventoryItem;

    use super::{filter_items, query_terms};

    fn item(raw_id: &str, name: &str, description: &str) -> InventoryItem {
        InventoryItem {
            article_id: ArticleId::parse(raw_id).expect("valid article id"),
            name: name.to_owned(),
            description: description.to_owned(),
            price_cents: 1000,
            locked_at: None,
            locked_until: None,
        }
    }

    #[test]
    fn terms_drop_stop_words_and_cap_at_four() {
        assert_eq!(
            query_terms("do you have the blue shirt in stock"),
            vec!["blue".to_owned(), "shirt".to_owned()],
        );
        assert_eq!(
            query_terms("bright red wool winter hat with tassels"),
            vec!["bright".to_owned(), "red".to_owned(), "wool".to_owned(), "winter".to_owned()],
        );
    }

    #[test]
    fn all_stop_word_query_yields_no_terms() {
        assert!(query_terms("show me the inventory list").is_empty());
    }

    #[test]
    fn filter_keeps_only_items_matching_every_term() {
        let items =
            vec![item("21may25-1", "Blue Shirt", "cotton"), item("21may25-2", "Red Hat", "")];

        let matched = filter_items(&items, "blue shirt");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "Blue Shirt");
    }

    #[test]
    fn filter_matches_across_name_and_description() {
        let items = vec![item("21may25-1", "Blue Shirt", "soft cotton")];
        assert_eq!(filter_items(&items, "cotton shirt").len(), 1);
        assert!(filter_items(&items, "silk shirt").is_empty());
    }

    #[test]
    fn empty_terms_match_everything_in_store_order() {
        let items =
            vec![item("21may25-1", "Blue Shirt", "cotton"), item("21may25-2", "Red Hat", "")];

        let matched = filter_items(&items, "show me the inventory");
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].name, "Blue Shirt");
        assert_eq!(matched[1].name, "Red Hat");
    }
}
