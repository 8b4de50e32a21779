//! 關聯運算子：join、group by、window rank / lag 與百分比。
//!
//! 全部都是純函式：輸入不被修改，輸出順序只取決於輸入內容與明確的排序鍵，
//! 不依賴 `HashMap` 的走訪順序。

use crate::domain::report::{Percentage, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;

/// 依任意條件的 inner join（巢狀迴圈）
pub fn inner_join<'l, 'r, L, R>(
    left: &'l [L],
    right: &'r [R],
    predicate: impl Fn(&L, &R) -> bool,
) -> Vec<(&'l L, &'r R)> {
    left.iter()
        .flat_map(|l| {
            right
                .iter()
                .filter(|r| predicate(l, *r))
                .map(move |r| (l, r))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// 依任意條件的 left join；左側每一列都會保留，沒配對到的右側為 `None`
pub fn left_join<'l, 'r, L, R>(
    left: &'l [L],
    right: &'r [R],
    predicate: impl Fn(&L, &R) -> bool,
) -> Vec<(&'l L, Option<&'r R>)> {
    let mut joined = Vec::with_capacity(left.len());
    for l in left {
        let before = joined.len();
        joined.extend(right.iter().filter(|r| predicate(l, *r)).map(|r| (l, Some(r))));
        if joined.len() == before {
            joined.push((l, None));
        }
    }
    joined
}

fn hash_index<'r, R, K: Eq + Hash>(
    right: &'r [R],
    right_key: impl Fn(&'r R) -> K,
) -> HashMap<K, Vec<&'r R>> {
    let mut index: HashMap<K, Vec<&'r R>> = HashMap::new();
    for r in right {
        index.entry(right_key(r)).or_default().push(r);
    }
    index
}

/// 等值 inner join，以右側建 hash index；結果順序與巢狀迴圈版本相同
pub fn inner_join_on<'l, 'r, L, R, K: Eq + Hash>(
    left: &'l [L],
    right: &'r [R],
    left_key: impl Fn(&'l L) -> K,
    right_key: impl Fn(&'r R) -> K,
) -> Vec<(&'l L, &'r R)> {
    let index = hash_index(right, right_key);
    let mut joined = Vec::new();
    for l in left {
        if let Some(matches) = index.get(&left_key(l)) {
            joined.extend(matches.iter().map(|r| (l, *r)));
        }
    }
    joined
}

/// 等值 left join
pub fn left_join_on<'l, 'r, L, R, K: Eq + Hash>(
    left: &'l [L],
    right: &'r [R],
    left_key: impl Fn(&'l L) -> K,
    right_key: impl Fn(&'r R) -> K,
) -> Vec<(&'l L, Option<&'r R>)> {
    let index = hash_index(right, right_key);
    let mut joined = Vec::with_capacity(left.len());
    for l in left {
        match index.get(&left_key(l)) {
            Some(matches) => joined.extend(matches.iter().map(|r| (l, Some(*r)))),
            None => joined.push((l, None)),
        }
    }
    joined
}

/// 分組後對每個分組套用的彙總函式
pub enum Aggregate<'a, T> {
    Count,
    CountDistinct(Box<dyn Fn(&T) -> Value + 'a>),
    Min(Box<dyn Fn(&T) -> Value + 'a>),
    Max(Box<dyn Fn(&T) -> Value + 'a>),
    Sum(Box<dyn Fn(&T) -> i64 + 'a>),
}

impl<'a, T> Aggregate<'a, T> {
    pub fn count_distinct(f: impl Fn(&T) -> Value + 'a) -> Self {
        Aggregate::CountDistinct(Box::new(f))
    }

    pub fn min(f: impl Fn(&T) -> Value + 'a) -> Self {
        Aggregate::Min(Box::new(f))
    }

    pub fn max(f: impl Fn(&T) -> Value + 'a) -> Self {
        Aggregate::Max(Box::new(f))
    }

    pub fn sum(f: impl Fn(&T) -> i64 + 'a) -> Self {
        Aggregate::Sum(Box::new(f))
    }

    fn apply(&self, rows: &[&T]) -> Value {
        match self {
            Aggregate::Count => Value::Int(rows.len() as i64),
            Aggregate::CountDistinct(f) => {
                let distinct: BTreeSet<Value> = rows.iter().map(|r| f(*r)).collect();
                Value::Int(distinct.len() as i64)
            }
            Aggregate::Min(f) => rows.iter().map(|r| f(*r)).min().unwrap_or(Value::Absent),
            Aggregate::Max(f) => rows.iter().map(|r| f(*r)).max().unwrap_or(Value::Absent),
            Aggregate::Sum(f) => Value::Int(rows.iter().map(|r| f(*r)).sum()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group<K> {
    pub key: K,
    /// 與傳入的彙總函式一一對應
    pub values: Vec<Value>,
}

impl<K> Group<K> {
    /// 取出第 `idx` 個彙總結果的整數值（Count / CountDistinct / Sum）
    pub fn int(&self, idx: usize) -> i64 {
        self.values.get(idx).and_then(Value::as_int).unwrap_or(0)
    }
}

/// 依 key 分組並彙總。分組只會由實際出現的列產生，因此不會有空分組；
/// 輸出依 key 排序。
pub fn group_by<'a, T, K: Ord>(
    rows: &'a [T],
    key_fn: impl Fn(&'a T) -> K,
    aggs: &[Aggregate<'_, T>],
) -> Vec<Group<K>> {
    let mut partitions: BTreeMap<K, Vec<&'a T>> = BTreeMap::new();
    for row in rows {
        partitions.entry(key_fn(row)).or_default().push(row);
    }

    partitions
        .into_iter()
        .map(|(key, members)| Group {
            key,
            values: aggs.iter().map(|agg| agg.apply(&members)).collect(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<T> {
    pub row: T,
    pub rank: usize,
}

/// SQL `RANK() OVER (PARTITION BY .. ORDER BY ..)`：同值同名次，下一個名次跳號。
///
/// 先以 (partition, order) 穩定排序，再單次走訪指定名次。
pub fn window_rank<T, P: Ord, O: Ord>(
    rows: Vec<T>,
    partition_fn: impl Fn(&T) -> P,
    order_fn: impl Fn(&T) -> O,
    direction: SortDirection,
) -> Vec<Ranked<T>> {
    let mut keyed: Vec<(P, O, T)> = rows
        .into_iter()
        .map(|row| (partition_fn(&row), order_fn(&row), row))
        .collect();

    keyed.sort_by(|a, b| {
        let order = match direction {
            SortDirection::Ascending => a.1.cmp(&b.1),
            SortDirection::Descending => b.1.cmp(&a.1),
        };
        a.0.cmp(&b.0).then(order)
    });

    let mut ranked = Vec::with_capacity(keyed.len());
    let mut previous: Option<(P, O)> = None;
    let mut position = 0;
    let mut rank = 0;

    for (partition, order, row) in keyed {
        match &previous {
            Some((p, o)) if *p == partition => {
                position += 1;
                if *o != order {
                    rank = position;
                }
            }
            _ => {
                position = 1;
                rank = 1;
            }
        }
        ranked.push(Ranked { row, rank });
        previous = Some((partition, order));
    }

    ranked
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lagged<T, V> {
    pub row: T,
    /// 往前 `offset` 列的值；前 `offset` 列沒有前值，為 `None`
    pub lag: Option<V>,
}

/// SQL `LAG(value, offset) OVER (ORDER BY ..)`
pub fn window_lag<T, O: Ord, V: Clone>(
    rows: Vec<T>,
    order_fn: impl Fn(&T) -> O,
    value_fn: impl Fn(&T) -> V,
    offset: usize,
) -> Vec<Lagged<T, V>> {
    let mut keyed: Vec<(O, T)> = rows.into_iter().map(|row| (order_fn(&row), row)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let values: Vec<V> = keyed.iter().map(|(_, row)| value_fn(row)).collect();

    keyed
        .into_iter()
        .enumerate()
        .map(|(i, (_, row))| Lagged {
            row,
            lag: i.checked_sub(offset).map(|j| values[j].clone()),
        })
        .collect()
}

/// `round(value * 100 / total, 2)`，四捨五入（half-up）；分母為 0 時沒有定義，回傳 `None`
pub fn percentage_of(value: u64, total: u64) -> Option<Percentage> {
    if total == 0 {
        return None;
    }
    let numerator = 2 * value as u128 * 10_000 + total as u128;
    let hundredths = numerator / (2 * total as u128);
    Some(Percentage::from_hundredths(hundredths as i64))
}
