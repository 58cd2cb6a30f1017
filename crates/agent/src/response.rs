/// The JSON part of a model reply. Replies are often wrapped in a markdown
/// fence, tagged ```json or bare; without a fence the whole reply is used.
pub fn json_payload(reply: &str) -> &str {
    if let Some((_, rest)) = reply.split_once("```json") {
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    let mut fenced = reply.split("```");
    match (fenced.next(), fenced.next()) {
        (Some(_), Some(inner)) => inner.trim(),
        _ => reply.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::json_payload;

    #[test]
    fn tagged_fence_is_unwrapped() {
        let reply = "Here you go:\n```json\n{\"summary\": \"x\"}\n```\nThanks";
        assert_eq!(json_payload(reply), "{\"summary\": \"x\"}");
    }

    #[test]
    fn bare_fence_is_unwrapped() {
        assert_eq!(json_payload("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn unfenced_reply_is_trimmed() {
        assert_eq!(json_payload("  {\"a\": 1}\n"), "{\"a\": 1}");
        assert_eq!(json_payload("plain words"), "plain words");
    }

    #[test]
    fn unterminated_fence_keeps_the_tail() {
        assert_eq!(json_payload("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }
}
