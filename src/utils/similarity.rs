//! 文本相似度
//!
//! Ratcliff/Obershelp 算法：反复寻找最长公共子串，`ratio = 2 * M / T`。
//! 用于简答题的自动判分。
//!
//! `b` 长度不少于 [`AUTOJUNK_MIN_LEN`] 时，出现次数超过 `len / 100 + 1`
//! 的字符不能作为匹配的起点（只能在扩展时被吸收），结果与 Python
//! `difflib.SequenceMatcher` 的默认行为一致。

use std::collections::HashMap;

/// 启用常见字符剔除的最小长度
pub const AUTOJUNK_MIN_LEN: usize = 200;

/// 计算两个字符串（忽略大小写）的相似度，范围 `[0.0, 1.0]`
///
/// `b` 一般传入标准答案
pub fn string_similarity(a: Option<&str>, b: Option<&str>) -> f64 {
    let a: Vec<char> = a.unwrap_or_default().to_lowercase().chars().collect();
    let b: Vec<char> = b.unwrap_or_default().to_lowercase().chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let matches = Matcher::new(&a, &b).matching_characters();
    2.0 * matches as f64 / total as f64
}

struct Matcher<'a> {
    a: &'a [char],
    b: &'a [char],
    /// 字符 → 在 `b` 中出现的位置（升序），已剔除常见字符
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> Matcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, &c) in b.iter().enumerate() {
            b2j.entry(c).or_default().push(j);
        }
        if b.len() >= AUTOJUNK_MIN_LEN {
            let limit = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= limit);
        }
        Self { a, b, b2j }
    }

    /// 统计所有匹配块的字符总数
    fn matching_characters(&self) -> usize {
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        let mut matched = 0;

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            matched += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }

        matched
    }

    /// 在给定区间内寻找最长公共子串，返回 `(i, j, 长度)`
    ///
    /// 长度相同时取 `a` 中最靠前的位置，其次取 `b` 中最靠前的位置
    fn longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let (a, b) = (self.a, self.b);
        let (mut besti, mut bestj, mut best) = (alo, blo, 0);
        // j → 以 (i - 1, j) 结尾的公共子串长度
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut next = HashMap::new();
            for &j in self.b2j.get(&a[i]).map(Vec::as_slice).unwrap_or_default() {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j.checked_sub(1).and_then(|p| j2len.get(&p)).copied().unwrap_or(0) + 1;
                next.insert(j, k);
                if k > best {
                    (besti, bestj, best) = (i + 1 - k, j + 1 - k, k);
                }
            }
            j2len = next;
        }

        // 被剔除的字符不能起头，但可以接在匹配两端
        while besti > alo && bestj > blo && a[besti - 1] == b[bestj - 1] {
            besti -= 1;
            bestj -= 1;
            best += 1;
        }
        while besti + best < ahi && bestj + best < bhi && a[besti + best] == b[bestj + best] {
            best += 1;
        }

        (besti, bestj, best)
    }
}
