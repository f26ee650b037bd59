//! Offset pagination primitives.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Requested slice of a result set (zero-based page number).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> DomainResult<Self> {
        if size == 0 {
            return Err(DomainError::validation("page size must be greater than zero"));
        }
        Ok(Self { page, size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Row offset of the first element of this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

/// One page of results plus the pagination metadata it was produced with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    content: Vec<T>,
    number: u32,
    size: u32,
    total_elements: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            number: request.page(),
            size: request.size(),
            total_elements,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    fn request(&self) -> PageRequest {
        PageRequest {
            page: self.number,
            size: self.size,
        }
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    /// Split into content and the metadata needed to rebuild the page.
    pub fn into_parts(self) -> (Vec<T>, PageRequest, u64) {
        let request = self.request();
        (self.content, request, self.total_elements)
    }
}
