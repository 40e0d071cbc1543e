use std::path::Path;
use std::sync::Mutex;

use log::info;
use tantivy::collector::{Count, TopDocs};
use tantivy::directory::MmapDirectory;
use tantivy::query::{AllQuery, QueryParser};
use tantivy::schema::{
    FAST, Field, IndexRecordOption, STORED, STRING, Schema, TEXT, TextFieldIndexing, TextOptions,
    Value as _,
};
use tantivy::tokenizer::{LowerCaser, NgramTokenizer, TextAnalyzer};
use tantivy::{Index, IndexReader, IndexWriter, Order, TantivyDocument, Term};

use crate::error::RegistryError;

pub const PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 50;
const NGRAM_TOKENIZER: &str = "name_ngrams_3_5";
const WRITER_MEMORY_BYTES: usize = 50_000_000;

/// Everything the index needs to know about a package, assembled from its
/// current latest version inside the publish/unpublish transaction.
#[derive(Debug, Clone)]
pub struct PackageDocument {
    pub name: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub author: Option<String>,
    pub maintainers: Vec<String>,
    pub contributors: Vec<String>,
    /// package modifytime as unix seconds, the tie-breaker for empty queries
    pub modified: i64,
}

/// One page of ranked hits; hits are package names to be resolved against
/// the relational store.
#[derive(Debug)]
pub struct SearchPage {
    pub total: usize,
    pub offset: usize,
    pub names: Vec<String>,
}

struct Fields {
    id: Field,
    name: Field,
    name_ngrams: Field,
    description: Field,
    keyword: Field,
    author: Field,
    maintainer: Field,
    contributor: Field,
    modified: Field,
}

/// Full-text index over the package catalog. Documents are keyed by package
/// name and always reflect the package's current latest version; the store
/// remains the source of truth and the index can be rebuilt from it.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: Fields,
}

impl SearchIndex {
    pub fn open(dir: &Path) -> Result<Self, RegistryError> {
        std::fs::create_dir_all(dir)?;

        let mut builder = Schema::builder();
        let ngram_indexing = TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(NGRAM_TOKENIZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        );
        let fields = Fields {
            id: builder.add_text_field("id", STRING | STORED),
            name: builder.add_text_field("name", TEXT),
            name_ngrams: builder.add_text_field("name_ngrams", ngram_indexing),
            description: builder.add_text_field("description", TEXT),
            keyword: builder.add_text_field("keyword", TEXT),
            author: builder.add_text_field("author", TEXT),
            maintainer: builder.add_text_field("maintainer", TEXT),
            contributor: builder.add_text_field("contributor", TEXT),
            modified: builder.add_i64_field("modified", FAST),
        };
        let schema = builder.build();

        let index = Index::open_or_create(MmapDirectory::open(dir)?, schema)?;
        index.tokenizers().register(
            NGRAM_TOKENIZER,
            TextAnalyzer::builder(NgramTokenizer::new(3, 5, false)?)
                .filter(LowerCaser)
                .build(),
        );

        let writer = index.writer(WRITER_MEMORY_BYTES)?;
        let reader = index.reader()?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
        })
    }

    fn make_document(&self, doc: &PackageDocument) -> TantivyDocument {
        let mut document = TantivyDocument::default();
        document.add_text(self.fields.id, &doc.name);
        document.add_text(self.fields.name, &doc.name);
        document.add_text(self.fields.name_ngrams, &doc.name);
        if let Some(description) = &doc.description {
            document.add_text(self.fields.description, description);
        }
        for keyword in &doc.keywords {
            document.add_text(self.fields.keyword, keyword);
        }
        if let Some(author) = &doc.author {
            document.add_text(self.fields.author, author);
        }
        for maintainer in &doc.maintainers {
            document.add_text(self.fields.maintainer, maintainer);
        }
        for contributor in &doc.contributors {
            document.add_text(self.fields.contributor, contributor);
        }
        document.add_i64(self.fields.modified, doc.modified);
        document
    }

    fn locked_writer(&self) -> Result<std::sync::MutexGuard<'_, IndexWriter>, RegistryError> {
        self.writer
            .lock()
            .map_err(|_| RegistryError::Index("Search index writer poisoned".to_string()))
    }

    /// Replaces the document for this package with its current state.
    pub fn upsert(&self, doc: &PackageDocument) -> Result<(), RegistryError> {
        let mut writer = self.locked_writer()?;
        writer.delete_term(Term::from_field_text(self.fields.id, &doc.name));
        writer.add_document(self.make_document(doc))?;
        writer.commit()?;
        drop(writer);
        self.reader.reload()?;
        Ok(())
    }

    pub fn remove(&self, package_name: &str) -> Result<(), RegistryError> {
        let mut writer = self.locked_writer()?;
        writer.delete_term(Term::from_field_text(self.fields.id, package_name));
        writer.commit()?;
        drop(writer);
        self.reader.reload()?;
        Ok(())
    }

    /// Drops every document and re-adds the given set; the out-of-band
    /// recovery path when index and store have diverged.
    pub fn rebuild(&self, docs: &[PackageDocument]) -> Result<(), RegistryError> {
        let mut writer = self.locked_writer()?;
        writer.delete_all_documents()?;
        for doc in docs {
            writer.add_document(self.make_document(doc))?;
        }
        writer.commit()?;
        drop(writer);
        self.reader.reload()?;
        info!("Rebuilt search index with {} documents", docs.len());
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.reader.searcher().num_docs() == 0
    }

    /// Relevance-ranked paginated search. An empty query matches everything,
    /// ordered by modification time descending.
    pub fn search(
        &self,
        query: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<SearchPage, RegistryError> {
        let searcher = self.reader.searcher();
        let limit = limit.clamp(1, MAX_PAGE_SIZE);

        let (total, addresses) = match query.filter(|q| !q.trim().is_empty()) {
            Some(q) => {
                let mut parser = QueryParser::for_index(
                    &self.index,
                    vec![
                        self.fields.name,
                        self.fields.name_ngrams,
                        self.fields.description,
                        self.fields.keyword,
                        self.fields.author,
                        self.fields.maintainer,
                        self.fields.contributor,
                    ],
                );
                parser.set_field_boost(self.fields.name, 2.0);
                parser.set_field_boost(self.fields.keyword, 1.5);
                let parsed = parser
                    .parse_query(q)
                    .map_err(|e| RegistryError::Validation(format!("Invalid search query: {e}")))?;
                let (total, top) = searcher.search(
                    &parsed,
                    &(Count, TopDocs::with_limit(limit).and_offset(offset)),
                )?;
                (
                    total,
                    top.into_iter().map(|(_, addr)| addr).collect::<Vec<_>>(),
                )
            }
            None => {
                let collector = TopDocs::with_limit(limit)
                    .and_offset(offset)
                    .order_by_fast_field::<i64>("modified", Order::Desc);
                let (total, top) = searcher.search(&AllQuery, &(Count, collector))?;
                (
                    total,
                    top.into_iter().map(|(_, addr)| addr).collect::<Vec<_>>(),
                )
            }
        };

        let mut names = Vec::with_capacity(addresses.len());
        for address in addresses {
            let document: TantivyDocument = searcher.doc(address)?;
            if let Some(name) = document
                .get_first(self.fields.id)
                .and_then(|value| value.as_str())
            {
                names.push(name.to_string());
            }
        }

        Ok(SearchPage {
            total,
            offset: offset.min(total),
            names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(name: &str, description: &str, modified: i64) -> PackageDocument {
        PackageDocument {
            name: name.to_string(),
            description: Some(description.to_string()),
            keywords: vec![],
            author: Some("alice".to_string()),
            maintainers: vec![],
            contributors: vec!["bob".to_string()],
            modified,
        }
    }

    #[test]
    fn test_upsert_and_search_by_name() {
        let dir = TempDir::new().unwrap();
        let index = SearchIndex::open(dir.path()).unwrap();
        index.upsert(&doc("webserver", "serves http", 1)).unwrap();
        index.upsert(&doc("parser", "parses things", 2)).unwrap();

        let page = index.search(Some("webserver"), PAGE_SIZE, 0).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.names, vec!["webserver".to_string()]);
    }

    #[test]
    fn test_ngram_substring_match() {
        let dir = TempDir::new().unwrap();
        let index = SearchIndex::open(dir.path()).unwrap();
        index.upsert(&doc("websocket-client", "ws client", 1)).unwrap();

        // a 3-gram of the name is enough to find it
        let page = index.search(Some("sock"), PAGE_SIZE, 0).unwrap();
        assert_eq!(page.names, vec!["websocket-client".to_string()]);
    }

    #[test]
    fn test_upsert_replaces_existing_document() {
        let dir = TempDir::new().unwrap();
        let index = SearchIndex::open(dir.path()).unwrap();
        index.upsert(&doc("mylib", "old description", 1)).unwrap();
        index.upsert(&doc("mylib", "new description", 2)).unwrap();

        let page = index.search(None, PAGE_SIZE, 0).unwrap();
        assert_eq!(page.total, 1);

        let by_new = index.search(Some("description:new"), PAGE_SIZE, 0).unwrap();
        assert_eq!(by_new.total, 1);
        let by_old = index.search(Some("description:old"), PAGE_SIZE, 0).unwrap();
        assert_eq!(by_old.total, 0);
    }

    #[test]
    fn test_empty_query_sorts_by_modified_desc() {
        let dir = TempDir::new().unwrap();
        let index = SearchIndex::open(dir.path()).unwrap();
        index.upsert(&doc("oldest", "a", 10)).unwrap();
        index.upsert(&doc("newest", "b", 30)).unwrap();
        index.upsert(&doc("middle", "c", 20)).unwrap();

        let page = index.search(None, PAGE_SIZE, 0).unwrap();
        assert_eq!(
            page.names,
            vec![
                "newest".to_string(),
                "middle".to_string(),
                "oldest".to_string()
            ]
        );
    }

    #[test]
    fn test_pagination() {
        let dir = TempDir::new().unwrap();
        let index = SearchIndex::open(dir.path()).unwrap();
        for i in 0..5 {
            index.upsert(&doc(&format!("pkg{i}"), "stuff", i)).unwrap();
        }

        let page = index.search(None, 2, 2).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.offset, 2);
        assert_eq!(page.names.len(), 2);
    }

    #[test]
    fn test_remove_and_rebuild() {
        let dir = TempDir::new().unwrap();
        let index = SearchIndex::open(dir.path()).unwrap();
        index.upsert(&doc("keepme", "a", 1)).unwrap();
        index.upsert(&doc("dropme", "b", 2)).unwrap();

        index.remove("dropme").unwrap();
        let page = index.search(None, PAGE_SIZE, 0).unwrap();
        assert_eq!(page.names, vec!["keepme".to_string()]);

        index
            .rebuild(&[doc("rebuilt", "c", 3)])
            .unwrap();
        let page = index.search(None, PAGE_SIZE, 0).unwrap();
        assert_eq!(page.names, vec!["rebuilt".to_string()]);
        assert!(!index.is_empty());
    }
}
