//! Finding post references inside a direct message.

use crate::instagram::Message;
use crate::share::resolver::PostReference;
use crate::share::url::{find_post_links, DOMAIN};

/// All post references carried by `message`, in order: links in the text,
/// the forwarded post, then the link attachment when nothing was forwarded.
pub fn detect_references(message: &Message) -> Vec<PostReference> {
    let mut references: Vec<PostReference> = Vec::new();

    if let Some(text) = message.text.as_deref() {
        for link in find_post_links(text) {
            log::debug!("Found URL in text: {}", link);
            push_unique(&mut references, PostReference::CanonicalUrl(link));
        }
    }

    match message.share_handle() {
        Some(handle) => {
            log::debug!("Found forwarded post in message {}", message.id);
            push_unique(&mut references, PostReference::OpaqueShareHandle(handle.clone()));
        }
        None => {
            if let Some(url) = message.link.as_ref().and_then(|link| link.url()) {
                if url.contains(DOMAIN) {
                    log::debug!("Found link attachment: {}", url);
                    push_unique(&mut references, PostReference::CanonicalUrl(url.to_string()));
                }
            }
        }
    }

    references
}

fn push_unique(references: &mut Vec<PostReference>, reference: PostReference) {
    if !references.contains(&reference) {
        references.push(reference);
    }
}
