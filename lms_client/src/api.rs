//! LMS resource endpoints.
//!
//! Payloads are passed through as opaque JSON; the pipeline only attaches
//! credentials.

use crate::{
    errors::ClientResult,
    pipeline::{ApiClient, error_for_status},
};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
struct AddToCart<'a> {
    course_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cart_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CreateOrder<'a> {
    cart_id: &'a str,
}

#[derive(Debug, Serialize)]
struct ApplyCoupon<'a> {
    order_oid: &'a str,
    coupon_code: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateReview<'a> {
    rating: u8,
    review_text: &'a str,
}

#[derive(Debug, Serialize)]
struct AskQuestion<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    lesson: Option<&'a str>,
    title: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Answer<'a> {
    content: &'a str,
}

/// Progress report for one lesson of an enrollment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LessonProgress {
    pub lesson_id: String,
    pub is_completed: bool,
    /// Seconds watched since the last report; the backend accumulates them
    pub time_spent: u64,
    /// Playback position in seconds
    pub last_position: u64,
}

impl ApiClient {
    pub async fn categories(&self) -> ClientResult<Value> {
        self.get_json("categories/").await
    }

    pub async fn courses(&self) -> ClientResult<Value> {
        self.get_json("courses/").await
    }

    pub async fn featured_courses(&self) -> ClientResult<Value> {
        self.get_json("courses/featured/").await
    }

    /// Full-text course search (`?q=`)
    pub async fn search_courses(&self, query: &str) -> ClientResult<Value> {
        let builder = self
            .request(Method::GET, "courses/search/")?
            .query(&[("q", query)]);
        let response = self.send(builder).await?;
        Ok(error_for_status(response).await?.json().await?)
    }

    pub async fn course(&self, slug: &str) -> ClientResult<Value> {
        self.get_json(&format!("courses/{slug}/")).await
    }

    pub async fn course_reviews(&self, slug: &str) -> ClientResult<Value> {
        self.get_json(&format!("courses/{slug}/reviews/")).await
    }

    /// Create or replace the caller's review; requires an enrollment
    pub async fn create_review(&self, slug: &str, rating: u8, review_text: &str) -> ClientResult<Value> {
        self.post_json(
            &format!("courses/{slug}/reviews/create/"),
            &CreateReview {
                rating,
                review_text,
            },
        )
        .await
    }

    pub async fn course_questions(&self, slug: &str) -> ClientResult<Value> {
        self.get_json(&format!("courses/{slug}/qa/")).await
    }

    /// Ask a question about a course, optionally tied to one lesson
    pub async fn ask_question(
        &self,
        slug: &str,
        lesson: Option<&str>,
        title: &str,
        content: &str,
    ) -> ClientResult<Value> {
        self.post_json(
            &format!("courses/{slug}/qa/create/"),
            &AskQuestion {
                lesson,
                title,
                content,
            },
        )
        .await
    }

    pub async fn answer_question(&self, question_id: &str, content: &str) -> ClientResult<Value> {
        self.post_json(&format!("qa/answer/{question_id}/"), &Answer { content })
            .await
    }

    /// Lesson content; full content only for enrolled users or free previews
    pub async fn lesson(&self, slug: &str, lesson_id: &str) -> ClientResult<Value> {
        self.get_json(&format!("courses/{slug}/lessons/{lesson_id}/"))
            .await
    }

    pub async fn cart(&self, cart_id: &str) -> ClientResult<Value> {
        self.get_json(&format!("cart/{cart_id}/")).await
    }

    /// Add a course to a cart; the backend allocates a cart when `cart_id` is `None`
    pub async fn add_to_cart(&self, course_id: &str, cart_id: Option<&str>) -> ClientResult<Value> {
        self.post_json("cart/add/", &AddToCart { course_id, cart_id })
            .await
    }

    pub async fn remove_from_cart(&self, cart_id: &str, course_id: &str) -> ClientResult<()> {
        self.delete(&format!("cart/{cart_id}/remove/{course_id}/"))
            .await
    }

    pub async fn cart_stats(&self, cart_id: &str) -> ClientResult<Value> {
        self.get_json(&format!("cart/stats/{cart_id}/")).await
    }

    pub async fn create_order(&self, cart_id: &str) -> ClientResult<Value> {
        self.post_json("order/create/", &CreateOrder { cart_id }).await
    }

    pub async fn orders(&self) -> ClientResult<Value> {
        self.get_json("order/list/").await
    }

    pub async fn apply_coupon(&self, order_oid: &str, coupon_code: &str) -> ClientResult<Value> {
        self.post_json(
            "order/coupon/",
            &ApplyCoupon {
                order_oid,
                coupon_code,
            },
        )
        .await
    }

    pub async fn enrollments(&self) -> ClientResult<Value> {
        self.get_json("student/enrollments/").await
    }

    pub async fn update_progress(
        &self,
        enrollment_id: &str,
        progress: &LessonProgress,
    ) -> ClientResult<Value> {
        self.post_json(&format!("student/progress/{enrollment_id}/"), progress)
            .await
    }

    pub async fn enroll_free(&self, course_id: &str) -> ClientResult<Value> {
        self.post_json(&format!("student/enroll-free/{course_id}/"), &serde_json::json!({}))
            .await
    }

    pub async fn wishlist(&self) -> ClientResult<Value> {
        self.get_json("wishlist/").await
    }

    pub async fn toggle_wishlist(&self, course_id: &str) -> ClientResult<Value> {
        self.post_json(&format!("wishlist/toggle/{course_id}/"), &serde_json::json!({}))
            .await
    }

    pub async fn notifications(&self) -> ClientResult<Value> {
        self.get_json("notifications/").await
    }

    /// Mark one notification as read, or all of them when `notification_id` is `None`
    pub async fn mark_notifications_read(&self, notification_id: Option<i64>) -> ClientResult<Value> {
        let path = match notification_id {
            Some(id) => format!("notifications/mark-read/{id}/"),
            None => "notifications/mark-read/".to_string(),
        };
        self.post_json(&path, &serde_json::json!({})).await
    }

    /// Course, student, review and earnings totals of the logged-in instructor
    pub async fn instructor_dashboard(&self) -> ClientResult<Value> {
        self.get_json("instructor/dashboard/").await
    }

    /// The instructor's own courses in every status
    pub async fn instructor_courses(&self) -> ClientResult<Value> {
        self.get_json("instructor/courses/").await
    }

    pub async fn instructor_coupons(&self) -> ClientResult<Value> {
        self.get_json("instructor/coupons/").await
    }
}
