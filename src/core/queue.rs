//! 线程安全 FIFO 队列，数据包队列和帧队列共用
//!
//! - push 永不拒绝容量（容量控制在外部：解码线程的过载检查）
//! - pop 非阻塞，空队列立即返回 `PopResult::Empty`（调用方轮询）
//! - `EndOfStream` 哨兵最多入队一次，被取出后队列不再产出任何数据
//! - 帧队列维护字节累计值，始终等于队列中所有单元的字节数之和

use crate::core::types::ByteSized;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// 入队元素：数据单元或流结束哨兵
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem<T> {
    Unit(T),
    EndOfStream,
}

/// 出队结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopResult<T> {
    Unit(T),
    Empty,
    EndOfStream,
}

impl<T> PopResult<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, PopResult::Empty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Empty,
    NonEmpty,
}

struct QueueInner<T> {
    items: VecDeque<QueueItem<T>>,
    byte_total: usize,
    end_queued: bool,
}

pub struct BoundedQueue<T> {
    inner: Mutex<QueueInner<T>>,
    /// 单元字节数；数据包队列不计字节，恒为 0
    measure: fn(&T) -> usize,
}

fn uncounted<T>(_: &T) -> usize {
    0
}

impl<T> BoundedQueue<T> {
    /// 数据包队列：只按个数排队，不做字节累计
    pub fn counted() -> Self {
        Self::with_measure(uncounted::<T>)
    }

    fn with_measure(measure: fn(&T) -> usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                byte_total: 0,
                end_queued: false,
            }),
            measure,
        }
    }

    /// 入队。哨兵之后的任何元素都会被丢弃，返回 false
    pub fn push(&self, item: QueueItem<T>) -> bool {
        let mut inner = self.inner.lock();
        if inner.end_queued {
            return false;
        }
        match &item {
            QueueItem::Unit(unit) => inner.byte_total += (self.measure)(unit),
            QueueItem::EndOfStream => inner.end_queued = true,
        }
        inner.items.push_back(item);
        true
    }

    pub fn push_unit(&self, unit: T) -> bool {
        self.push(QueueItem::Unit(unit))
    }

    pub fn push_end(&self) -> bool {
        self.push(QueueItem::EndOfStream)
    }

    pub fn pop(&self) -> PopResult<T> {
        let mut inner = self.inner.lock();
        match inner.items.pop_front() {
            None => PopResult::Empty,
            Some(QueueItem::EndOfStream) => PopResult::EndOfStream,
            Some(QueueItem::Unit(unit)) => {
                inner.byte_total -= (self.measure)(&unit);
                PopResult::Unit(unit)
            }
        }
    }

    pub fn peek_state(&self) -> QueueState {
        if self.inner.lock().items.is_empty() {
            QueueState::Empty
        } else {
            QueueState::NonEmpty
        }
    }

    pub fn is_empty(&self) -> bool {
        self.peek_state() == QueueState::Empty
    }

    pub fn current_byte_total(&self) -> usize {
        self.inner.lock().byte_total
    }

    /// 队列中元素个数（含哨兵）
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// 清空队列并恢复初始状态（允许再次入队哨兵），返回丢弃的元素数
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let dropped = inner.items.len();
        inner.items.clear();
        inner.byte_total = 0;
        inner.end_queued = false;
        dropped
    }
}

impl<T: ByteSized> BoundedQueue<T> {
    /// 帧队列：按单元字节数累计
    pub fn sized() -> Self {
        Self::with_measure(<T as ByteSized>::byte_size)
    }
}
