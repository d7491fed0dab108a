use askama::Template;

use crate::models::Article;

/// One row of the article list.
pub struct ArticleLink {
    pub title: String,
    pub fetch_path: String,
    pub extracted: bool,
}

impl From<&Article> for ArticleLink {
    fn from(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            fetch_path: format!("/get-article?url={}", urlencoding::encode(&article.url)),
            extracted: article.is_extracted(),
        }
    }
}

fn links(articles: &[Article]) -> Vec<ArticleLink> {
    articles.iter().map(ArticleLink::from).collect()
}

#[derive(Template)]
#[template(path = "page.html")]
pub struct PageTemplate {
    pub articles: Vec<ArticleLink>,
}

impl PageTemplate {
    pub fn new(articles: &[Article]) -> Self {
        Self {
            articles: links(articles),
        }
    }
}

#[derive(Template)]
#[template(path = "article_list.html")]
pub struct ArticleListTemplate {
    pub articles: Vec<ArticleLink>,
}

impl ArticleListTemplate {
    pub fn new(articles: &[Article]) -> Self {
        Self {
            articles: links(articles),
        }
    }
}

/// Detail fragment; `content` is the extracted html and is emitted unescaped.
#[derive(Template)]
#[template(path = "article.html")]
pub struct ArticleTemplate {
    pub title: String,
    pub url: String,
    pub content: String,
}

impl From<&Article> for ArticleTemplate {
    fn from(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            url: article.url.clone(),
            content: article.html.clone().unwrap_or_default(),
        }
    }
}
