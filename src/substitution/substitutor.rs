//! Character-at-a-time longest-match substitution over a [`RadixTree`].

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::mem;
use std::str;

use crate::error::{Result, StringSubsError};
use crate::radix::{NodeId, RadixTree};

/// Streaming substitution state for one input stream.
///
/// The substitutor walks the tree as characters arrive and only commits
/// output once no longer match is possible, so it holds at most the longest
/// ambiguous look-ahead rather than the whole input. At every position the
/// longest key that prefixes the remaining input is replaced by its value;
/// positions where no key matches pass through literally.
///
/// # Examples
///
/// ```
/// use stringsubs::radix::RadixTree;
/// use stringsubs::substitution::StreamingSubstitutor;
///
/// let mut tree = RadixTree::new();
/// tree.insert("foo", "bar").unwrap();
///
/// let mut substitutor = StreamingSubstitutor::new(&tree);
/// let mut output = String::new();
/// for c in "xxfooyy".chars() {
///     if let Some(produced) = substitutor.feed(c) {
///         output.push_str(&produced);
///     }
/// }
/// if let Some(produced) = substitutor.finish() {
///     output.push_str(&produced);
/// }
/// assert_eq!(output, "xxbaryy");
/// ```
#[derive(Debug, Clone)]
pub struct StreamingSubstitutor<'a> {
    tree: &'a RadixTree,
    /// Node currently being matched.
    node: NodeId,
    /// Characters of `node`'s fragment matched so far.
    matched: usize,
    /// Characters consumed since the last node carrying a value.
    processed: String,
    /// Characters to re-evaluate from the root before accepting new input.
    pending: VecDeque<char>,
    /// Deepest node with a value seen on the current path.
    last_match: Option<NodeId>,
}

impl<'a> StreamingSubstitutor<'a> {
    pub fn new(tree: &'a RadixTree) -> Self {
        Self {
            tree,
            node: tree.root(),
            matched: 0,
            processed: String::new(),
            pending: VecDeque::new(),
            last_match: None,
        }
    }

    /// Consume one input character.
    ///
    /// Returns `None` while a longer match is still possible and nothing can
    /// be committed yet.
    pub fn feed(&mut self, c: char) -> Option<String> {
        let mut output = String::new();
        self.pending.push_back(c);
        self.drain(&mut output);
        non_empty(output)
    }

    /// Signal end of stream and flush whatever is still being matched.
    ///
    /// The substitutor is back at its initial state afterwards.
    pub fn finish(&mut self) -> Option<String> {
        let mut output = String::new();
        let tree = self.tree;
        while self.node != tree.root() {
            let node = tree.node(self.node);
            if self.matched == node.key().len() && node.value().is_some() {
                self.commit_candidate();
            }
            self.fail(None, &mut output);
            self.drain(&mut output);
        }
        self.reset();
        non_empty(output)
    }

    /// Substitute a complete string in one call.
    pub fn substitute_str(&mut self, input: &str) -> String {
        let mut output = String::with_capacity(input.len());
        for c in input.chars() {
            if let Some(produced) = self.feed(c) {
                output.push_str(&produced);
            }
        }
        if let Some(produced) = self.finish() {
            output.push_str(&produced);
        }
        output
    }

    /// True when no characters are held back awaiting a longer match.
    pub fn is_idle(&self) -> bool {
        self.node == self.tree.root() && self.pending.is_empty()
    }

    fn drain(&mut self, output: &mut String) {
        while let Some(c) = self.pending.pop_front() {
            self.step(c, output);
        }
    }

    fn step(&mut self, c: char, output: &mut String) {
        let tree = self.tree;
        let node = tree.node(self.node);
        let fragment = node.key();

        if self.matched < fragment.len() {
            if fragment[self.matched] == c {
                self.processed.push(c);
                self.matched += 1;
            } else {
                self.fail(Some(c), output);
            }
            return;
        }

        if node.value().is_some() {
            self.commit_candidate();
        }
        match node.child(c) {
            Some(child) => {
                self.processed.push(c);
                self.node = child;
                self.matched = 1;
            }
            None => self.fail(Some(c), output),
        }
    }

    /// Remember the current node as the longest match so far. Everything
    /// consumed up to here is covered by its value.
    fn commit_candidate(&mut self) {
        self.last_match = Some(self.node);
        self.processed.clear();
    }

    /// The current path cannot be extended by `c` (or input ended).
    ///
    /// Emits the longest value matched on the path, or failing that a single
    /// literal character, and queues everything after it for re-evaluation
    /// from the root ahead of any previously pending characters.
    fn fail(&mut self, c: Option<char>, output: &mut String) {
        let mut replay = mem::take(&mut self.processed);
        replay.extend(c);

        let mut chars = replay.chars();
        match self.last_match.take() {
            Some(id) => output.push_str(self.tree.node(id).value().unwrap_or_default()),
            None => output.extend(chars.next()),
        }
        for ch in chars.rev() {
            self.pending.push_front(ch);
        }

        self.node = self.tree.root();
        self.matched = 0;
    }

    fn reset(&mut self) {
        self.node = self.tree.root();
        self.matched = 0;
        self.processed.clear();
        self.pending.clear();
        self.last_match = None;
    }
}

fn non_empty(output: String) -> Option<String> {
    if output.is_empty() { None } else { Some(output) }
}

/// Stream `reader` through a fresh [`StreamingSubstitutor`] into `writer`.
///
/// Input is decoded as UTF-8 incrementally; every produced chunk is written
/// as soon as it is committed. Failures of either side are reported as
/// [`StringSubsError::Substitution`] naming `resource`. Output written before
/// a failure stays written.
pub fn substitute<R, W>(tree: &RadixTree, mut reader: R, mut writer: W, resource: &str) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut substitutor = StreamingSubstitutor::new(tree);
    let mut carry: Vec<u8> = Vec::new();

    loop {
        let read = {
            let buf = reader
                .fill_buf()
                .map_err(|e| StringSubsError::substitution(resource, e))?;
            carry.extend_from_slice(buf);
            buf.len()
        };
        if read == 0 {
            break;
        }
        reader.consume(read);

        let valid = match str::from_utf8(&carry) {
            Ok(text) => text.len(),
            // A multi-byte sequence split across reads; keep the tail.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => return Err(invalid_utf8(resource, e)),
        };
        let text = str::from_utf8(&carry[..valid]).map_err(|e| invalid_utf8(resource, e))?;
        for c in text.chars() {
            if let Some(produced) = substitutor.feed(c) {
                writer
                    .write_all(produced.as_bytes())
                    .map_err(|e| StringSubsError::substitution(resource, e))?;
            }
        }
        carry.drain(..valid);
    }

    if !carry.is_empty() {
        return Err(StringSubsError::substitution(
            resource,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "stream ends inside a UTF-8 sequence",
            ),
        ));
    }

    if let Some(produced) = substitutor.finish() {
        writer
            .write_all(produced.as_bytes())
            .map_err(|e| StringSubsError::substitution(resource, e))?;
    }
    writer
        .flush()
        .map_err(|e| StringSubsError::substitution(resource, e))
}

fn invalid_utf8(resource: &str, e: str::Utf8Error) -> StringSubsError {
    StringSubsError::substitution(
        resource,
        std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    )
}

#[cfg(test)]
mod tests {
    use std::io::{self, BufReader, Cursor, Read};

    use super::*;

    fn tree_of(pairs: &[(&str, &str)]) -> RadixTree {
        let mut tree = RadixTree::new();
        for (k, v) in pairs {
            tree.insert(k, *v).unwrap();
        }
        tree
    }

    /// Feed one character at a time, concatenating every produced chunk.
    fn run(tree: &RadixTree, input: &str) -> String {
        let mut substitutor = StreamingSubstitutor::new(tree);
        let mut output = String::new();
        for c in input.chars() {
            if let Some(produced) = substitutor.feed(c) {
                output.push_str(&produced);
            }
        }
        if let Some(produced) = substitutor.finish() {
            output.push_str(&produced);
        }
        output
    }

    #[test]
    fn test_no_match_passes_through() {
        let tree = tree_of(&[("foo", "bar")]);
        assert_eq!(run(&tree, "hello, world"), "hello, world");
        assert_eq!(run(&tree, ""), "");
    }

    #[test]
    fn test_single_key() {
        let tree = tree_of(&[("foo", "bar")]);
        assert_eq!(run(&tree, "xxfooyy"), "xxbaryy");
        assert_eq!(run(&tree, "foo"), "bar");
        assert_eq!(run(&tree, "foofoo"), "barbar");
        assert_eq!(run(&tree, "fofoo"), "fobar");
        assert_eq!(run(&tree, "ffoo"), "fbar");
    }

    #[test]
    fn test_longest_match_over_prefix_keys() {
        let tree = tree_of(&[("acid", "ACID"), ("acidic", "ACIDIC")]);
        assert_eq!(run(&tree, "acid"), "ACID");
        assert_eq!(run(&tree, "acidic"), "ACIDIC");
        assert_eq!(run(&tree, "acidy"), "ACIDy");
        assert_eq!(run(&tree, "acidi"), "ACIDi");
        assert_eq!(run(&tree, "acidiy"), "ACIDiy");
        assert_eq!(run(&tree, "acidacidic"), "ACIDACIDIC");
    }

    #[test]
    fn test_failed_partial_match_loses_nothing() {
        let tree = tree_of(&[("successive", "SX")]);
        assert_eq!(run(&tree, "successful"), "successful");
        assert_eq!(run(&tree, "success"), "success");
        assert_eq!(run(&tree, "ssuccessive"), "sSX");
    }

    #[test]
    fn test_overlapping_candidates() {
        let tree = tree_of(&[("success", "S"), ("successive", "SX")]);
        assert_eq!(run(&tree, "successive"), "SX");
        assert_eq!(run(&tree, "successful"), "Sful");
        assert_eq!(run(&tree, "successi"), "Si");
    }

    #[test]
    fn test_shorter_key_inside_abandoned_candidate() {
        let tree = tree_of(&[("abcd", "X"), ("bc", "Y")]);
        assert_eq!(run(&tree, "abce"), "aYe");
        assert_eq!(run(&tree, "abc"), "aY");
        assert_eq!(run(&tree, "abcd"), "X");
    }

    #[test]
    fn test_value_emitted_once_committed() {
        let tree = tree_of(&[("foo", "bar")]);
        let mut substitutor = StreamingSubstitutor::new(&tree);
        assert_eq!(substitutor.feed('f'), None);
        assert_eq!(substitutor.feed('o'), None);
        assert_eq!(substitutor.feed('o'), None);
        assert!(!substitutor.is_idle());
        assert_eq!(substitutor.feed('!'), Some("bar!".to_string()));
        assert!(substitutor.is_idle());
        assert_eq!(substitutor.finish(), None);
    }

    #[test]
    fn test_empty_value_reported_as_none() {
        let tree = tree_of(&[("foo", "")]);
        let mut substitutor = StreamingSubstitutor::new(&tree);
        for c in "foo".chars() {
            assert_eq!(substitutor.feed(c), None);
        }
        assert_eq!(substitutor.finish(), None);
        assert_eq!(run(&tree, "afoob"), "ab");
    }

    #[test]
    fn test_finish_resets_state() {
        let tree = tree_of(&[("foo", "bar")]);
        let mut substitutor = StreamingSubstitutor::new(&tree);
        assert_eq!(substitutor.substitute_str("xfo"), "xfo");
        assert!(substitutor.is_idle());
        assert_eq!(substitutor.substitute_str("foo"), "bar");
    }

    #[test]
    fn test_multibyte() {
        let tree = tree_of(&[("壱", "1"), ("第壱位", "first")]);
        assert_eq!(run(&tree, "第壱位"), "first");
        assert_eq!(run(&tree, "第壱"), "第1");
    }

    #[test]
    fn test_substitute_reader_writer() {
        let tree = tree_of(&[("%%%PORT%%%", "4848"), ("%%%HOST%%%", "localhost")]);
        let input = "<listener host=\"%%%HOST%%%\" port=\"%%%PORT%%%\"/>\n";
        let mut output = Vec::new();
        substitute(&tree, Cursor::new(input), &mut output, "domain.xml").unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "<listener host=\"localhost\" port=\"4848\"/>\n"
        );
    }

    #[test]
    fn test_substitute_split_utf8_sequence() {
        let tree = tree_of(&[("壱", "1")]);
        let input = "第壱位".as_bytes();
        // A one-byte buffer splits every multi-byte character.
        let reader = BufReader::with_capacity(1, input);
        let mut output = Vec::new();
        substitute(&tree, reader, &mut output, "memory").unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "第1位");
    }

    #[test]
    fn test_substitute_invalid_utf8() {
        let tree = tree_of(&[("a", "b")]);
        let mut output = Vec::new();
        let err = substitute(&tree, Cursor::new(vec![b'a', 0xff, b'a']), &mut output, "bad.txt")
            .unwrap_err();
        match err {
            StringSubsError::Substitution { resource, .. } => assert_eq!(resource, "bad.txt"),
            other => panic!("unexpected error: {other}"),
        }

        let err = substitute(&tree, Cursor::new(vec![b'a', 0xe5]), &mut Vec::new(), "cut.txt")
            .unwrap_err();
        assert!(matches!(err, StringSubsError::Substitution { .. }));
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk gone"))
        }
    }

    #[test]
    fn test_reader_failure_names_resource() {
        let tree = tree_of(&[("a", "b")]);
        let err = substitute(&tree, BufReader::new(FailingReader), Vec::new(), "server.policy")
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("server.policy"));
        assert!(message.contains("disk gone"));
    }

    /// Accepts `limit` bytes, then fails every write.
    struct LimitedWriter {
        accepted: Vec<u8>,
        limit: usize,
    }

    impl Write for LimitedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.limit - self.accepted.len();
            if room == 0 {
                return Err(io::Error::other("device full"));
            }
            let n = room.min(buf.len());
            self.accepted.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_failure_keeps_partial_output() {
        let tree = tree_of(&[("a", "XY")]);
        let mut sink = LimitedWriter {
            accepted: Vec::new(),
            limit: 7,
        };
        let err = substitute(&tree, "aaaaaaaaaa".as_bytes(), &mut sink, "domain.xml").unwrap_err();

        match &err {
            StringSubsError::Substitution { resource, source } => {
                assert_eq!(resource, "domain.xml");
                assert_eq!(source.to_string(), "device full");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(sink.accepted, b"XYXYXYX");
    }
}
