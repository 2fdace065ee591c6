//! Threaded producer/consumer SAX variant (spec §4.5 "A threaded
//! variant..."). The producer thread runs [`crate::xml::sax::parse`]
//! against an owned-token handler, batching events across a bounded
//! channel; the consumer drains batches until the channel closes (the
//! end-of-stream sentinel).
//!
//! Tokens can't borrow across the thread boundary, so this module's
//! [`ParseToken`] owns its payload (`String` rather than `StrView`) — the
//! single-threaded parser stays zero-copy; this variant trades that for
//! concurrency, same tradeoff spec §9 calls out for the JSON producer.

use crate::config::ParserConfig;
use crate::error::{ImportError, Result};
use crate::strings::InternPool;
use crate::xml::namespace::{NamespaceId, NamespaceRepository};
use crate::xml::sax::{self, SaxHandler, XmlAttribute, XmlDeclaration};
use crate::xml::tokens::{TokenId, TokenMap};
use std::sync::mpsc::{sync_channel, Receiver};
use std::thread::JoinHandle;

#[derive(Debug, Clone)]
pub struct OwnedAttribute {
    pub ns: NamespaceId,
    pub token: TokenId,
    pub local_name: String,
    pub value: String,
    pub transient: bool,
}

#[derive(Debug, Clone)]
pub enum ParseToken {
    Declaration(XmlDeclaration),
    StartElement { ns: NamespaceId, token: TokenId, attrs: Vec<OwnedAttribute> },
    EndElement { ns: NamespaceId, token: TokenId },
    Characters { text: String, transient: bool },
}

/// Spawns a producer thread that parses `input` and streams `ParseToken`
/// batches back over a bounded channel. Returns the receiving end plus a
/// join handle the caller awaits after draining, to retrieve the parse
/// result (and, on success, the `NamespaceRepository` the producer used,
/// handed back so the caller can merge its interned URIs).
pub fn parse_threaded(
    input: Vec<u8>,
    mut repo: NamespaceRepository,
    tokens: TokenMap,
    config: ParserConfig,
) -> (Receiver<Vec<ParseToken>>, JoinHandle<Result<NamespaceRepository>>) {
    // Channel capacity bounds how many *batches* (not tokens) can be
    // in flight; `max_token_size / min_token_size` approximates the
    // spec's upper watermark in units of whole batches.
    let capacity = (config.max_token_size / config.min_token_size.max(1)).max(1);
    let (tx, rx) = sync_channel::<Vec<ParseToken>>(capacity);

    let handle = std::thread::spawn(move || -> Result<NamespaceRepository> {
        let mut collector = BatchingHandler::new(tx, config.min_token_size);
        let result = sax::parse(&input, &mut repo, &tokens, &mut collector);
        collector.flush();
        result.map(|()| repo)
    });

    (rx, handle)
}

struct BatchingHandler {
    tx: std::sync::mpsc::SyncSender<Vec<ParseToken>>,
    pending: Vec<ParseToken>,
    min_token_size: usize,
}

impl BatchingHandler {
    fn new(tx: std::sync::mpsc::SyncSender<Vec<ParseToken>>, min_token_size: usize) -> Self {
        BatchingHandler { tx, pending: Vec::new(), min_token_size: min_token_size.max(1) }
    }

    fn push(&mut self, token: ParseToken) {
        self.pending.push(token);
        if self.pending.len() >= self.min_token_size {
            self.flush();
        }
    }

    /// Hand the accumulated batch off to the consumer. A full channel
    /// blocks here — the producer-side realization of the upper
    /// watermark.
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending);
        // The consumer may have stopped draining (dropped its Receiver);
        // that is this variant's cancellation path (spec §4.5) and is not
        // itself a parse error, so a send failure here is silently
        // swallowed rather than propagated.
        let _ = self.tx.send(batch);
    }
}

impl SaxHandler for BatchingHandler {
    fn declaration(&mut self, decl: &XmlDeclaration) {
        self.push(ParseToken::Declaration(decl.clone()));
    }

    fn start_element(&mut self, ns: NamespaceId, token: TokenId, attrs: &[XmlAttribute<'_>]) {
        let owned = attrs
            .iter()
            .map(|a| OwnedAttribute {
                ns: a.ns,
                token: a.token,
                local_name: a.local_name.to_string(),
                value: a.value.to_string_lossy().into_owned(),
                transient: a.transient,
            })
            .collect();
        self.push(ParseToken::StartElement { ns, token, attrs: owned });
    }

    fn end_element(&mut self, ns: NamespaceId, token: TokenId) {
        self.push(ParseToken::EndElement { ns, token });
    }

    fn characters(&mut self, value: crate::strings::StrView<'_>, transient: bool) {
        self.push(ParseToken::Characters { text: value.to_string_lossy().into_owned(), transient });
    }
}

/// Drain every batch from `rx`, re-emitting each token to `handler` as if
/// it had been parsed directly — used by a consumer that wants the
/// threaded variant's concurrency without writing its own token-to-event
/// translation.
pub fn drain_into(rx: Receiver<Vec<ParseToken>>, pool: &mut InternPool, handler: &mut dyn SaxHandler) {
    for batch in rx {
        for token in batch {
            replay(token, pool, handler);
        }
    }
}

fn replay(token: ParseToken, pool: &mut InternPool, handler: &mut dyn SaxHandler) {
    match token {
        ParseToken::Declaration(decl) => handler.declaration(&decl),
        ParseToken::StartElement { ns, token, attrs } => {
            let views: Vec<XmlAttribute<'_>> = attrs
                .iter()
                .map(|a| {
                    let (view, _) = pool.intern_str(&a.value);
                    XmlAttribute { ns: a.ns, token: a.token, local_name: a.local_name.as_str(), value: view, transient: false }
                })
                .collect();
            handler.start_element(ns, token, &views);
        }
        ParseToken::EndElement { ns, token } => handler.end_element(ns, token),
        ParseToken::Characters { text, transient } => {
            let (view, _) = pool.intern_str(&text);
            handler.characters(view, transient);
        }
    }
}

/// Convenience wrapper mirroring the spec's "error propagation" contract:
/// joins the producer thread and converts a panicked thread into a
/// structural error rather than propagating the panic to the consumer.
pub fn join_producer(handle: JoinHandle<Result<NamespaceRepository>>) -> Result<NamespaceRepository> {
    handle.join().unwrap_or_else(|_| Err(ImportError::structural("parser thread panicked", 0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::namespace::NamespaceRepository;

    #[derive(Default)]
    struct CountingHandler {
        starts: usize,
        ends: usize,
        chars: usize,
    }

    impl SaxHandler for CountingHandler {
        fn start_element(&mut self, _ns: NamespaceId, _token: TokenId, _attrs: &[XmlAttribute<'_>]) {
            self.starts += 1;
        }
        fn end_element(&mut self, _ns: NamespaceId, _token: TokenId) {
            self.ends += 1;
        }
        fn characters(&mut self, _value: crate::strings::StrView<'_>, _transient: bool) {
            self.chars += 1;
        }
    }

    #[test]
    fn threaded_parse_delivers_same_event_counts_as_direct_parse() {
        let xml = b"<root><a>1</a><b>2</b><c>3</c></root>".to_vec();
        let repo = NamespaceRepository::new();
        let tokens = TokenMap::new(&["root", "a", "b", "c"]);
        let mut config = ParserConfig::default();
        config.min_token_size = 2;
        config.max_token_size = 8;

        let (rx, handle) = parse_threaded(xml, repo, tokens, config);
        let mut pool = InternPool::new();
        let mut handler = CountingHandler::default();
        drain_into(rx, &mut pool, &mut handler);
        let repo = join_producer(handle).unwrap();
        drop(repo);

        assert_eq!(handler.starts, 4);
        assert_eq!(handler.ends, 4);
        assert_eq!(handler.chars, 3);
    }

    #[test]
    fn consumer_dropping_receiver_does_not_panic_producer() {
        let xml = b"<root><a/><a/><a/><a/><a/></root>".to_vec();
        let repo = NamespaceRepository::new();
        let tokens = TokenMap::new(&["root", "a"]);
        let mut config = ParserConfig::default();
        config.min_token_size = 1;
        config.max_token_size = 1;

        let (rx, handle) = parse_threaded(xml, repo, tokens, config);
        drop(rx);
        let result = join_producer(handle);
        assert!(result.is_ok());
    }
}
