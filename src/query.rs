//! Query preprocessing: abbreviation and synonym expansion.
//!
//! Expansion only widens keyword recall. The original query text always
//! comes first so its terms keep their weight; novel terms are appended.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w]").expect("non-word pattern is valid"));

const ABBREVIATIONS: &[(&str, &[&str])] = &[
    ("oop", &["object-oriented programming", "object oriented programming"]),
    ("api", &["application programming interface"]),
    ("sql", &["structured query language"]),
    ("html", &["hypertext markup language"]),
    ("css", &["cascading style sheets"]),
    ("js", &["javascript"]),
    ("http", &["hypertext transfer protocol"]),
    ("https", &["hypertext transfer protocol secure"]),
    ("url", &["uniform resource locator"]),
    ("uri", &["uniform resource identifier"]),
    ("json", &["javascript object notation"]),
    ("xml", &["extensible markup language"]),
    ("rest", &["representational state transfer"]),
    ("soap", &["simple object access protocol"]),
    ("crud", &["create read update delete"]),
    ("mvc", &["model view controller"]),
    ("orm", &["object relational mapping"]),
    ("dbms", &["database management system"]),
    ("rdbms", &["relational database management system"]),
    ("nosql", &["not only sql"]),
    ("ai", &["artificial intelligence"]),
    ("ml", &["machine learning"]),
    ("dl", &["deep learning"]),
    ("nlp", &["natural language processing"]),
    ("cv", &["computer vision"]),
    ("cnn", &["convolutional neural network"]),
    ("rnn", &["recurrent neural network"]),
    ("lstm", &["long short-term memory"]),
    ("gpu", &["graphics processing unit"]),
    ("cpu", &["central processing unit"]),
    ("ram", &["random access memory"]),
    ("rom", &["read only memory"]),
    ("os", &["operating system"]),
    ("ide", &["integrated development environment"]),
    ("sdk", &["software development kit"]),
    ("cli", &["command line interface"]),
    ("gui", &["graphical user interface"]),
    ("ui", &["user interface"]),
    ("ux", &["user experience"]),
    ("tcp", &["transmission control protocol"]),
    ("udp", &["user datagram protocol"]),
    ("ip", &["internet protocol"]),
    ("dns", &["domain name system"]),
    ("ftp", &["file transfer protocol"]),
    ("ssh", &["secure shell"]),
    ("ssl", &["secure sockets layer"]),
    ("tls", &["transport layer security"]),
];

const SYNONYMS: &[(&str, &[&str])] = &[
    ("function", &["method", "procedure", "routine"]),
    ("variable", &["var", "identifier"]),
    ("class", &["type", "object"]),
    ("array", &["list", "collection"]),
    ("loop", &["iteration", "repeat"]),
    ("condition", &["if", "statement"]),
    ("algorithm", &["procedure", "method"]),
    ("data structure", &["structure", "container"]),
    ("database", &["db", "data store"]),
    ("server", &["host", "node"]),
    ("client", &["user", "browser"]),
];

/// Expands known abbreviations and synonyms in a query.
#[derive(Debug, Clone)]
pub struct QueryPreprocessor {
    abbreviations: HashMap<String, Vec<String>>,
    synonyms: HashMap<String, Vec<String>>,
    /// Multi-word synonym keys, in table order.
    phrases: Vec<(String, Vec<String>)>,
}

impl QueryPreprocessor {
    /// Create a preprocessor with the built-in tables.
    pub fn new() -> Self {
        Self::with_tables(ABBREVIATIONS, SYNONYMS)
    }

    /// Create a preprocessor with custom tables.
    pub fn with_tables(abbreviations: &[(&str, &[&str])], synonyms: &[(&str, &[&str])]) -> Self {
        fn to_map(table: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
            table
                .iter()
                .map(|(key, values)| {
                    (
                        key.to_string(),
                        values.iter().map(|v| v.to_string()).collect(),
                    )
                })
                .collect()
        }

        let phrases = synonyms
            .iter()
            .filter(|(key, _)| key.contains(' '))
            .map(|(key, values)| {
                (
                    key.to_string(),
                    values.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect();

        Self {
            abbreviations: to_map(abbreviations),
            synonyms: to_map(synonyms),
            phrases,
        }
    }

    /// Expand `query`. Returns the original text followed by any novel
    /// terms, or the original text unchanged when nothing was added.
    pub fn preprocess(&self, query: &str) -> String {
        let original = query.trim();
        if original.is_empty() {
            return original.to_string();
        }

        let lower = original.to_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();

        let mut expanded: Vec<String> = Vec::with_capacity(words.len());
        let mut synonym_terms: Vec<String> = Vec::new();

        for word in &words {
            let clean = clean_word(word);
            expanded.push(word.to_string());
            if let Some(expansions) = self.abbreviations.get(&clean) {
                expanded.extend(expansions.iter().cloned());
            }
            if let Some(synonyms) = self.synonyms.get(&clean) {
                synonym_terms.extend(synonyms.iter().cloned());
            }
        }

        // Multi-word synonym keys can't match a single token
        for (phrase, synonyms) in &self.phrases {
            if lower.contains(phrase.as_str()) {
                synonym_terms.extend(synonyms.iter().cloned());
            }
        }

        let original_words: HashSet<&str> = words.iter().copied().collect();
        let mut seen: HashSet<String> = HashSet::new();
        let novel: Vec<String> = expanded
            .into_iter()
            .chain(synonym_terms)
            .filter(|term| seen.insert(term.clone()))
            .filter(|term| !original_words.contains(term.as_str()))
            .collect();

        if novel.is_empty() {
            original.to_string()
        } else {
            format!("{} {}", original, novel.join(" "))
        }
    }

    /// Whitespace-separated terms of the preprocessed query.
    pub fn expanded_terms(&self, query: &str) -> Vec<String> {
        self.preprocess(query)
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Whether `term` is a known abbreviation (punctuation and case ignored).
    pub fn is_abbreviation(&self, term: &str) -> bool {
        self.abbreviations
            .contains_key(&clean_word(&term.to_lowercase()))
    }
}

impl Default for QueryPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

fn clean_word(word: &str) -> String {
    NON_WORD.replace_all(word, "").into_owned()
}
