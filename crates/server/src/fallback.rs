//! Canned replies for when the model quota is exhausted.
//!
//! The storefront stays useful without the model: a keyword match on the
//! shopper's message picks a category-appropriate suggestion from the
//! showroom catalog.

pub fn fallback_reply(message: &str) -> String {
    let normalized = message.to_lowercase();

    if contains_any(&normalized, &["sofa", "couch", "sectional"]) {
        "Our assistant is briefly unavailable, but here are some popular sofas: \
         the Modern Sectional Sofa ($1,299.00 on sale) and the Classic Leather \
         Sofa. Browse the full range under the Sofas category."
            .to_string()
    } else if contains_any(&normalized, &["chair", "stool", "seat"]) {
        "Our assistant is briefly unavailable, but shoppers love the Ergonomic \
         Office Chair and the Velvet Accent Chair. You can browse every chair \
         under the Chairs category."
            .to_string()
    } else if contains_any(&normalized, &["table", "desk", "dining"]) {
        "Our assistant is briefly unavailable, but take a look at the Extending \
         Dining Table and the Glass Coffee Table under the Tables category."
            .to_string()
    } else if contains_any(&normalized, &["bed", "mattress", "bedroom"]) {
        "Our assistant is briefly unavailable, but the Queen Platform Bed and \
         the King Bed Frame are both on sale under the Beds category."
            .to_string()
    } else {
        "Our assistant is briefly unavailable. Please browse the catalog by \
         category, or try asking again in a few minutes."
            .to_string()
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::fallback_reply;

    #[test]
    fn sofa_queries_suggest_sofas() {
        let reply = fallback_reply("I'm hunting for a comfy COUCH");
        assert!(reply.contains("Sofa"));
    }

    #[test]
    fn table_queries_suggest_tables() {
        let reply = fallback_reply("need a desk for my office");
        assert!(reply.contains("Table"));
    }

    #[test]
    fn unmatched_queries_get_a_generic_reply() {
        let reply = fallback_reply("do you ship to Alaska?");
        assert!(reply.contains("browse the catalog"));
    }
}
