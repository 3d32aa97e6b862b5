//! 列表分页

/// 分页结果
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 当前页（从 1 开始）
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// 取出第 `page` 页的数据
///
/// 页码会被限制在 `[1, total_pages]`；`per_page` 为 0 时按 1 处理
pub fn paginate<T: Clone>(items: &[T], per_page: usize, page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);

    let start = (page - 1) * per_page;
    let end = (start + per_page).min(total_items);

    Page {
        items: items[start..end].to_vec(),
        page,
        total_pages,
        total_items,
    }
}
