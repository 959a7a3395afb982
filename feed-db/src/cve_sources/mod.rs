use std::panic;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

pub mod nist;

pub(crate) const DEFAULT_POOL_WIDTH: usize = 20;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub fn http_client() -> Result<reqwest::blocking::Client, reqwest::Error> {
    reqwest::blocking::Client::builder()
        .timeout(Some(REQUEST_TIMEOUT))
        .build()
}

/// Runs `work` over `jobs` on a bounded pool of scoped worker threads and
/// joins them all before returning, so the caller always sees one result per
/// job. Result order is unspecified.
pub(crate) fn run_pool<J, R, F>(width: usize, jobs: Vec<J>, work: F) -> Vec<R>
where
    J: Send,
    R: Send,
    F: Fn(J) -> R + Sync,
{
    let width = width.min(jobs.len()).max(1);
    let queue = Mutex::new(jobs.into_iter());
    let mut results = Vec::new();

    thread::scope(|scope| {
        let workers: Vec<_> = (0..width)
            .map(|_| {
                scope.spawn(|| {
                    let mut done = Vec::new();
                    loop {
                        let job = queue
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .next();
                        match job {
                            Some(job) => done.push(work(job)),
                            None => break,
                        }
                    }
                    done
                })
            })
            .collect();

        for worker in workers {
            match worker.join() {
                Ok(done) => results.extend(done),
                Err(payload) => panic::resume_unwind(payload),
            }
        }
    });

    results
}

#[cfg(test)]
mod tests {
    use super::run_pool;

    #[test]
    fn pool_returns_one_result_per_job() {
        let jobs: Vec<u32> = (0..57).collect();
        let mut results = run_pool(8, jobs, |n| n * n);
        results.sort_unstable();

        let expected: Vec<u32> = (0..57).map(|n| n * n).collect();
        assert_eq!(expected, results);
    }

    #[test]
    fn pool_handles_more_workers_than_jobs() {
        let results = run_pool(20, vec![1, 2], |n| n + 1);
        assert_eq!(2, results.len());
    }

    #[test]
    fn pool_handles_no_jobs() {
        let results: Vec<u32> = run_pool(20, Vec::new(), |n| n);
        assert!(results.is_empty());
    }
}
