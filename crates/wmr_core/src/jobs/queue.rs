//! In-memory batch queue.

use std::collections::VecDeque;

use super::types::{Job, JobId, JobStatus};

/// FIFO of jobs waiting to be processed.
///
/// Jobs leave the queue when the scheduler picks them up; their status is
/// tracked by the scheduler from then on.
#[derive(Debug, Default)]
pub struct BatchQueue {
    jobs: VecDeque<Job>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job to the back of the queue.
    pub fn enqueue(&mut self, mut job: Job) -> JobId {
        job.status = JobStatus::Queued;
        let id = job.id;
        tracing::debug!("Queued job {} ({})", id, job.name());
        self.jobs.push_back(job);
        id
    }

    /// Take the oldest job.
    pub fn dequeue_next(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    /// Remove a queued job by ID.
    pub fn remove(&mut self, id: JobId) -> Option<Job> {
        let index = self.jobs.iter().position(|j| j.id == id)?;
        self.jobs.remove(index)
    }

    /// Remove every queued job, oldest first.
    pub fn drain(&mut self) -> Vec<Job> {
        self.jobs.drain(..).collect()
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.jobs.iter().any(|j| j.id == id)
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Number of jobs in queue.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Check if queue is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Iterate jobs in queue order.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::Video;
    use crate::timeline::ZoneTimeline;

    fn job(name: &str) -> Job {
        let video = Arc::new(Video::new(format!("/v/{}", name), 10, 25.0, 64, 64));
        let timeline = ZoneTimeline::for_video(&video);
        Job::new(video, &timeline, format!("/out/clean_{}", name))
    }

    #[test]
    fn fifo_order() {
        let mut queue = BatchQueue::new();
        let a = queue.enqueue(job("a.mp4"));
        let b = queue.enqueue(job("b.mp4"));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.dequeue_next().map(|j| j.id), Some(a));
        assert_eq!(queue.dequeue_next().map(|j| j.id), Some(b));
        assert!(queue.dequeue_next().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn remove_by_id() {
        let mut queue = BatchQueue::new();
        let a = queue.enqueue(job("a.mp4"));
        let b = queue.enqueue(job("b.mp4"));
        let c = queue.enqueue(job("c.mp4"));

        assert!(queue.remove(b).is_some());
        assert!(queue.remove(b).is_none());
        assert!(!queue.contains(b));

        let order: Vec<_> = queue.iter().map(|j| j.id).collect();
        assert_eq!(order, vec![a, c]);
    }

    #[test]
    fn drain_empties_queue() {
        let mut queue = BatchQueue::new();
        queue.enqueue(job("a.mp4"));
        queue.enqueue(job("b.mp4"));

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].name(), "a.mp4");
        assert!(queue.is_empty());
    }
}
