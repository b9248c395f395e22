/********************************************************************************
 * Copyright (c) 2025 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Deferred task queue for the rare places where an emission is intentionally
//! not synchronous. The kernel itself never defers; tests and embedders drive
//! the queue explicitly.

use crate::streams::lock_unpoisoned;
use std::collections::VecDeque;
use std::sync::Mutex;

type Task = Box<dyn FnOnce() + Send>;

/// FIFO of deferred closures. `tick` runs everything queued at the time of
/// the call; tasks deferred while ticking run on the next tick.
#[derive(Default)]
pub struct TickQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl TickQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer(&self, task: impl FnOnce() + Send + 'static) {
        lock_unpoisoned(&self.tasks).push_back(Box::new(task));
    }

    pub fn is_empty(&self) -> bool {
        lock_unpoisoned(&self.tasks).is_empty()
    }

    /// Runs the currently queued tasks in FIFO order and returns how many ran.
    pub fn tick(&self) -> usize {
        let batch: Vec<Task> = {
            let mut tasks = lock_unpoisoned(&self.tasks);
            tasks.drain(..).collect()
        };
        let count = batch.len();
        for task in batch {
            task();
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn tick_runs_tasks_in_fifo_order_exactly_once() {
        let queue = TickQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = order.clone();
            queue.defer(move || lock_unpoisoned(&order).push(n));
        }

        assert_eq!(queue.tick(), 3);
        assert_eq!(queue.tick(), 0);
        assert_eq!(*lock_unpoisoned(&order), vec![0, 1, 2]);
    }

    #[test]
    fn tasks_deferred_while_ticking_wait_for_the_next_tick() {
        let queue = Arc::new(TickQueue::new());
        let ran = Arc::new(Mutex::new(Vec::new()));

        let queue_in = queue.clone();
        let ran_in = ran.clone();
        queue.defer(move || {
            lock_unpoisoned(&ran_in).push("outer");
            let ran_nested = ran_in.clone();
            queue_in.defer(move || lock_unpoisoned(&ran_nested).push("nested"));
        });

        assert_eq!(queue.tick(), 1);
        assert_eq!(*lock_unpoisoned(&ran), vec!["outer"]);
        assert_eq!(queue.tick(), 1);
        assert_eq!(*lock_unpoisoned(&ran), vec!["outer", "nested"]);
    }
}
