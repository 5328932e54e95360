//! Listing pagination: newest-first with a base64 index cursor.
//!
//! Collections are kept in creation order; listings serve them reversed. The
//! page token is the base64 of the next index to serve, counting downward,
//! so iteration ends when the page includes index zero.
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("Invalid page size")]
    InvalidSize,
    #[error("Invalid page token")]
    InvalidToken,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PageParams {
    pub size: Option<usize>,
    pub start: Option<usize>,
}

/// Parse `pageSize`/`pageToken` query parameters.
pub fn parse_params(query: &HashMap<String, String>) -> Result<PageParams, PageError> {
    let size = match query.get("pageSize") {
        Some(raw) => {
            let parsed: usize = raw.parse().map_err(|_| PageError::InvalidSize)?;
            if parsed == 0 {
                return Err(PageError::InvalidSize);
            }
            Some(parsed)
        }
        None => None,
    };
    let start = match query.get("pageToken") {
        Some(raw) => {
            let decoded = STANDARD.decode(raw).map_err(|_| PageError::InvalidToken)?;
            let text = String::from_utf8(decoded).map_err(|_| PageError::InvalidToken)?;
            Some(text.parse().map_err(|_| PageError::InvalidToken)?)
        }
        None => None,
    };
    Ok(PageParams { size, start })
}

#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: String,
    pub total_size: usize,
}

/// Slice one page out of `items` (creation order), serving newest first.
pub fn paginate<T: Clone>(items: &[T], params: PageParams) -> Result<Page<T>, PageError> {
    let total = items.len();
    if total == 0 {
        if params.start.is_some() {
            return Err(PageError::InvalidToken);
        }
        return Ok(Page {
            items: Vec::new(),
            next_page_token: String::new(),
            total_size: 0,
        });
    }

    let start = match params.start {
        Some(index) if index >= total => return Err(PageError::InvalidToken),
        Some(index) => index,
        None => total - 1,
    };
    let count = params.size.unwrap_or(total).min(start + 1);

    let mut page = Vec::with_capacity(count);
    for step in 0..count {
        page.push(items[start - step].clone());
    }
    let served_down_to = start + 1 - count;
    let next_page_token = if served_down_to == 0 {
        String::new()
    } else {
        STANDARD.encode((served_down_to - 1).to_string())
    };
    Ok(Page {
        items: page,
        next_page_token,
        total_size: total,
    })
}
