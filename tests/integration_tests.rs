use courseboard::config::{ForumConfig, StorageBackend};
use courseboard::models::{Caller, CreateReply, CreateTopic, ForumRole, UpdateTag};
use courseboard::services::assignment_tags::AssignmentTagService;
use courseboard::services::categories;
use courseboard::services::privileges::{Privileges, SqlPrivileges};
use courseboard::services::tag_store::{open_tag_store, TagStore};
use courseboard::services::topics::{TopicFilter, TopicService};
use courseboard::services::users;
use courseboard::{Database, ForumError};
use std::sync::Arc;

const BACKENDS: [StorageBackend; 2] = [StorageBackend::Relational, StorageBackend::KeyValue];

fn create_test_db() -> Database {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let id: u32 = rng.gen();
    let name = format!("test_db_{}", id);

    let db = Database::open_memory(&name).expect("Failed to create test database");
    db.migrate().expect("Failed to run migrations");
    db
}

fn create_test_store(backend: StorageBackend) -> (Database, Arc<dyn TagStore>) {
    let db = create_test_db();
    let store = open_tag_store(backend, &db);
    (db, store)
}

/// A small course: one category moderated by the instructor, plus an
/// administrator and two students.
struct Course {
    db: Database,
    cid: i64,
    admin: Caller,
    instructor: Caller,
    student: Caller,
    classmate: Caller,
    tags: AssignmentTagService,
    topics: TopicService,
}

fn create_user(db: &Database, username: &str, groups: &[&str]) -> (Caller, String) {
    let groups: Vec<String> = groups.iter().map(|g| g.to_string()).collect();
    let (user, token) =
        users::create_user(db, username, None, &groups).expect("Failed to create user");
    (Caller::new(user.uid), token)
}

fn create_course(backend: StorageBackend, topics_per_page: usize) -> Course {
    let db = create_test_db();
    let forum = ForumConfig::default();

    let (admin, _) = create_user(&db, "admin", &["administrators"]);
    let (instructor, _) = create_user(&db, "prof", &["instructors"]);
    let (student, _) = create_user(&db, "alice", &[]);
    let (classmate, _) = create_user(&db, "bob", &[]);

    let category = categories::create_category(&db, "CS 101").expect("Failed to create category");
    categories::add_moderator(&db, category.cid, instructor.uid).expect("Failed to add moderator");

    let privileges: Arc<dyn Privileges> = Arc::new(SqlPrivileges::new(db.clone(), &forum));
    let store = open_tag_store(backend, &db);
    let tags = AssignmentTagService::new(store.clone(), privileges.clone(), forum.instructor_group);
    let topics = TopicService::new(db.clone(), store, privileges, topics_per_page);

    Course {
        db,
        cid: category.cid,
        admin,
        instructor,
        student,
        classmate,
        tags,
        topics,
    }
}

fn new_topic(title: &str, anonymous: bool, tags: Vec<i64>) -> CreateTopic {
    CreateTopic {
        title: Some(title.to_string()),
        content: Some(format!("Question about {}", title)),
        is_anonymous: anonymous,
        tags,
    }
}

fn new_reply(content: &str) -> CreateReply {
    CreateReply {
        content: Some(content.to_string()),
        is_anonymous: false,
    }
}

mod tag_store_tests {
    use super::*;

    #[test]
    fn test_create_and_get_tag() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);

            let tag = store
                .create("  Homework 1 ", None, None)
                .expect("Failed to create tag");
            assert!(tag.id > 0);
            assert_eq!(tag.name, "Homework 1");
            assert_eq!(tag.color, "#3498db");
            assert_eq!(tag.category, None);
            assert_eq!(tag.created_at, tag.updated_at);

            let fetched = store.get(tag.id).expect("Failed to get tag");
            assert_eq!(fetched, Some(tag));
            assert_eq!(store.backend(), backend);
        }
    }

    #[test]
    fn test_create_with_color_and_category() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);

            let tag = store
                .create("Project", Some("#e74c3c"), Some("projects"))
                .expect("Failed to create tag");
            assert_eq!(tag.color, "#e74c3c");
            assert_eq!(tag.category.as_deref(), Some("projects"));

            let fetched = store.get(tag.id).unwrap().unwrap();
            assert_eq!(fetched.category.as_deref(), Some("projects"));
        }
    }

    #[test]
    fn test_create_rejects_empty_name() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);

            let result = store.create("   ", None, None);
            assert!(matches!(result, Err(ForumError::InvalidData(_))));
            assert!(store.get_all().unwrap().is_empty());
        }
    }

    #[test]
    fn test_create_rejects_bad_color() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);

            let result = store.create("Quiz", Some("red"), None);
            assert!(matches!(result, Err(ForumError::InvalidData(_))));
        }
    }

    #[test]
    fn test_get_missing_tag() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);
            assert!(store.get(42).unwrap().is_none());
            assert!(!store.exists(42).unwrap());
        }
    }

    #[test]
    fn test_get_all_in_creation_order() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);

            for name in ["Homework 2", "Homework 1", "Exam"] {
                store.create(name, None, None).unwrap();
            }

            let names: Vec<String> = store.get_all().unwrap().into_iter().map(|t| t.name).collect();
            assert_eq!(names, vec!["Homework 2", "Homework 1", "Exam"]);
        }
    }

    #[test]
    fn test_update_changes_only_given_fields() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);
            let tag = store.create("Lab 1", None, Some("labs")).unwrap();

            let updated = store
                .update(
                    tag.id,
                    &UpdateTag {
                        color: Some("#2ecc71".to_string()),
                        ..Default::default()
                    },
                )
                .expect("Failed to update tag");
            assert_eq!(updated.name, "Lab 1");
            assert_eq!(updated.color, "#2ecc71");
            assert_eq!(updated.category.as_deref(), Some("labs"));
            assert_eq!(updated.created_at, tag.created_at);

            let fetched = store.get(tag.id).unwrap().unwrap();
            assert_eq!(fetched, updated);
        }
    }

    #[test]
    fn test_update_missing_tag() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);
            let result = store.update(
                7,
                &UpdateTag {
                    name: Some("Nope".to_string()),
                    ..Default::default()
                },
            );
            assert!(matches!(result, Err(ForumError::NotFound(_))));
        }
    }

    #[test]
    fn test_update_rejects_empty_name() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);
            let tag = store.create("Lab 2", None, None).unwrap();

            let result = store.update(
                tag.id,
                &UpdateTag {
                    name: Some(" ".to_string()),
                    ..Default::default()
                },
            );
            assert!(matches!(result, Err(ForumError::InvalidData(_))));
            assert_eq!(store.get(tag.id).unwrap().unwrap().name, "Lab 2");
        }
    }

    #[test]
    fn test_set_and_get_post_tags() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);
            let a = store.create("Homework 1", None, None).unwrap();
            let b = store.create("Homework 2", None, None).unwrap();

            store.set_post_tags(10, &[b.id, a.id, b.id]).unwrap();
            let ids: Vec<i64> = store.get_post_tags(10).unwrap().iter().map(|t| t.id).collect();
            assert_eq!(ids, vec![a.id, b.id]);

            store.set_post_tags(10, &[b.id]).unwrap();
            let ids: Vec<i64> = store.get_post_tags(10).unwrap().iter().map(|t| t.id).collect();
            assert_eq!(ids, vec![b.id]);
            assert!(store.get_tag_posts(a.id).unwrap().is_empty());
            assert_eq!(store.get_tag_posts(b.id).unwrap(), vec![10]);

            store.set_post_tags(10, &[]).unwrap();
            assert!(store.get_post_tags(10).unwrap().is_empty());
            assert!(store.get_tag_posts(b.id).unwrap().is_empty());
        }
    }

    #[test]
    fn test_set_post_tags_unknown_tag_keeps_previous() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);
            let a = store.create("Homework 1", None, None).unwrap();
            store.set_post_tags(5, &[a.id]).unwrap();

            let result = store.set_post_tags(5, &[a.id, 999]);
            assert!(matches!(result, Err(ForumError::NotFound(_))));

            let tags = store.get_post_tags(5).unwrap();
            assert_eq!(tags.len(), 1);
            assert_eq!(tags[0].id, a.id);
        }
    }

    #[test]
    fn test_add_to_post_is_idempotent() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);
            let a = store.create("Exam", None, None).unwrap();

            store.add_to_post(3, a.id).unwrap();
            store.add_to_post(3, a.id).unwrap();
            assert_eq!(store.get_post_tags(3).unwrap().len(), 1);
            assert_eq!(store.get_tag_posts(a.id).unwrap(), vec![3]);

            let result = store.add_to_post(3, 999);
            assert!(matches!(result, Err(ForumError::NotFound(_))));
        }
    }

    #[test]
    fn test_remove_from_post() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);
            let a = store.create("Exam", None, None).unwrap();
            let b = store.create("Quiz", None, None).unwrap();
            store.set_post_tags(3, &[a.id, b.id]).unwrap();

            store.remove_from_post(3, a.id).unwrap();
            let ids: Vec<i64> = store.get_post_tags(3).unwrap().iter().map(|t| t.id).collect();
            assert_eq!(ids, vec![b.id]);
            assert!(store.get_tag_posts(a.id).unwrap().is_empty());

            // removing an absent link is a no-op
            store.remove_from_post(3, a.id).unwrap();
        }
    }

    #[test]
    fn test_delete_removes_tag_from_posts() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);
            let hw1 = store.create("Homework 1", None, None).unwrap();
            let hw2 = store.create("Homework 2", None, None).unwrap();
            store.set_post_tags(10, &[hw1.id, hw2.id]).unwrap();
            store.set_post_tags(11, &[hw1.id]).unwrap();

            let deleted = store.delete(hw1.id).expect("Failed to delete tag");
            assert_eq!(deleted.name, "Homework 1");

            assert!(store.get(hw1.id).unwrap().is_none());
            assert!(store.get_tag_posts(hw1.id).unwrap().is_empty());
            let ids: Vec<i64> = store.get_post_tags(10).unwrap().iter().map(|t| t.id).collect();
            assert_eq!(ids, vec![hw2.id]);
            assert!(store.get_post_tags(11).unwrap().is_empty());
            assert_eq!(store.get_all().unwrap().len(), 1);

            let again = store.delete(hw1.id);
            assert!(matches!(again, Err(ForumError::NotFound(_))));
        }
    }

    #[test]
    fn test_ids_are_not_reused_after_delete() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);
            let a = store.create("A", None, None).unwrap();
            let b = store.create("B", None, None).unwrap();
            store.delete(b.id).unwrap();
            let c = store.create("C", None, None).unwrap();
            assert!(c.id > a.id);
            if backend == StorageBackend::KeyValue {
                assert!(c.id > b.id);
            }
        }
    }

    #[test]
    fn test_get_tag_posts_lists_every_tagged_post() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);
            let a = store.create("Homework 1", None, None).unwrap();
            for pid in [4, 8, 15] {
                store.add_to_post(pid, a.id).unwrap();
            }

            let mut pids = store.get_tag_posts(a.id).unwrap();
            pids.sort_unstable();
            assert_eq!(pids, vec![4, 8, 15]);
            assert!(store.get_tag_posts(999).unwrap().is_empty());
        }
    }

    #[test]
    fn test_filter_posts_by_tags_is_or() {
        for backend in BACKENDS {
            let (_db, store) = create_test_store(backend);
            let hw = store.create("Homework", None, None).unwrap();
            let exam = store.create("Exam", None, None).unwrap();
            let lab = store.create("Lab", None, None).unwrap();
            store.set_post_tags(1, &[hw.id]).unwrap();
            store.set_post_tags(2, &[exam.id]).unwrap();
            store.set_post_tags(3, &[lab.id]).unwrap();
            store.set_post_tags(4, &[hw.id, exam.id]).unwrap();

            let pids = [4, 3, 2, 1, 5];
            assert_eq!(
                store.filter_posts_by_tags(&pids, &[hw.id, exam.id]).unwrap(),
                vec![4, 2, 1]
            );
            assert_eq!(store.filter_posts_by_tags(&pids, &[lab.id]).unwrap(), vec![3]);
            assert_eq!(store.filter_posts_by_tags(&pids, &[]).unwrap(), pids.to_vec());
            assert!(store.filter_posts_by_tags(&[], &[hw.id]).unwrap().is_empty());
        }
    }

    #[test]
    fn test_tag_usage_relational_only() {
        let (_db, store) = create_test_store(StorageBackend::Relational);
        let a = store.create("Homework 1", None, None).unwrap();
        let b = store.create("Homework 2", None, None).unwrap();
        store.set_post_tags(1, &[a.id, b.id]).unwrap();
        store.set_post_tags(2, &[a.id]).unwrap();

        let usage = store.tag_usage().expect("Failed to load usage");
        let counts: Vec<(i64, i64)> = usage.iter().map(|u| (u.tag.id, u.count)).collect();
        assert_eq!(counts, vec![(a.id, 2), (b.id, 1)]);

        let (_db, store) = create_test_store(StorageBackend::KeyValue);
        store.create("Homework 1", None, None).unwrap();
        assert!(matches!(
            store.tag_usage(),
            Err(ForumError::BackendUnsupported(_))
        ));
    }
}

mod assignment_tag_service_tests {
    use super::*;
    use courseboard::models::CreateTag;

    fn create_tag(name: &str) -> CreateTag {
        CreateTag {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_instructor_and_admin_can_manage_tags() {
        for backend in BACKENDS {
            let course = create_course(backend, 20);

            let hw = course
                .tags
                .create(&course.instructor, &create_tag("Homework 1"))
                .expect("Instructor should create tags");
            let exam = course
                .tags
                .create(&course.admin, &create_tag("Midterm"))
                .expect("Admin should create tags");

            let renamed = course
                .tags
                .update(
                    &course.instructor,
                    exam.id,
                    &UpdateTag {
                        name: Some("Midterm Exam".to_string()),
                        ..Default::default()
                    },
                )
                .unwrap();
            assert_eq!(renamed.name, "Midterm Exam");

            course.tags.delete(&course.admin, hw.id).unwrap();
            let names: Vec<String> = course
                .tags
                .list(&course.student)
                .unwrap()
                .into_iter()
                .map(|t| t.name)
                .collect();
            assert_eq!(names, vec!["Midterm Exam"]);
        }
    }

    #[test]
    fn test_students_cannot_change_tags() {
        for backend in BACKENDS {
            let course = create_course(backend, 20);
            let hw = course
                .tags
                .create(&course.instructor, &create_tag("Homework 1"))
                .unwrap();

            assert!(matches!(
                course.tags.create(&course.student, &create_tag("Mine")),
                Err(ForumError::Forbidden)
            ));
            assert!(matches!(
                course.tags.delete(&course.student, hw.id),
                Err(ForumError::Forbidden)
            ));
            assert!(matches!(
                course.tags.set_post_tags(&course.student, 1, Some(&[hw.id])),
                Err(ForumError::Forbidden)
            ));
            assert!(matches!(
                course.tags.add_to_post(&course.student, 1, hw.id),
                Err(ForumError::Forbidden)
            ));

            // reads are open to any signed-in user
            assert_eq!(course.tags.get(&course.student, hw.id).unwrap().name, "Homework 1");
        }
    }

    #[test]
    fn test_guests_cannot_read_tags() {
        let course = create_course(StorageBackend::Relational, 20);
        assert!(matches!(
            course.tags.list(&Caller::GUEST),
            Err(ForumError::Unauthenticated)
        ));
        assert!(matches!(
            course.tags.get_post_tags(&Caller::GUEST, 1),
            Err(ForumError::Unauthenticated)
        ));
        assert!(!course.tags.is_instructor_or_admin(&Caller::GUEST).unwrap());
    }

    #[test]
    fn test_service_validates_input() {
        let course = create_course(StorageBackend::Relational, 20);

        assert!(matches!(
            course.tags.create(&course.instructor, &CreateTag::default()),
            Err(ForumError::InvalidData(_))
        ));
        assert!(matches!(
            course.tags.get(&course.student, 0),
            Err(ForumError::InvalidData(_))
        ));
        assert!(matches!(
            course.tags.get(&course.student, 99),
            Err(ForumError::NotFound(_))
        ));
        assert!(matches!(
            course.tags.set_post_tags(&course.instructor, 1, None),
            Err(ForumError::InvalidData(_))
        ));
    }

    #[test]
    fn test_post_tag_changes_return_current_tags() {
        for backend in BACKENDS {
            let course = create_course(backend, 20);
            let hw = course
                .tags
                .create(&course.instructor, &create_tag("Homework 1"))
                .unwrap();
            let lab = course
                .tags
                .create(&course.instructor, &create_tag("Lab 1"))
                .unwrap();

            let tags = course
                .tags
                .set_post_tags(&course.instructor, 7, Some(&[lab.id, hw.id]))
                .unwrap();
            assert_eq!(tags.len(), 2);

            let tags = course.tags.remove_from_post(&course.instructor, 7, lab.id).unwrap();
            assert_eq!(tags.len(), 1);
            assert_eq!(tags[0].id, hw.id);

            let tags = course.tags.add_to_post(&course.admin, 7, lab.id).unwrap();
            assert_eq!(tags.len(), 2);

            assert_eq!(course.tags.get_tag_posts(&course.student, hw.id).unwrap(), vec![7]);
        }
    }

    #[test]
    fn test_usage_requires_editor() {
        let course = create_course(StorageBackend::Relational, 20);
        course
            .tags
            .create(&course.instructor, &create_tag("Homework 1"))
            .unwrap();

        assert_eq!(course.tags.usage(&course.instructor).unwrap().len(), 1);
        assert!(matches!(
            course.tags.usage(&course.student),
            Err(ForumError::Forbidden)
        ));
    }
}

mod resolution_tests {
    use super::*;

    #[test]
    fn test_new_topic_is_unresolved() {
        let course = create_course(StorageBackend::Relational, 20);
        let topic = course
            .topics
            .create_topic(&course.student, course.cid, &new_topic("Recursion", false, vec![]))
            .unwrap();
        assert!(!topic.topic.is_resolved);
        assert!(topic.topic.resolved_at.is_none());
        assert!(topic.topic.resolved_by.is_none());
    }

    #[test]
    fn test_student_reply_does_not_resolve() {
        let course = create_course(StorageBackend::Relational, 20);
        let tid = course
            .topics
            .create_topic(&course.student, course.cid, &new_topic("Recursion", false, vec![]))
            .unwrap()
            .topic
            .tid;

        course
            .topics
            .reply(&course.classmate, tid, &new_reply("Same question"))
            .unwrap();
        let topic = course.topics.topic_with_posts(&course.student, tid).unwrap();
        assert!(!topic.topic.is_resolved);
    }

    #[test]
    fn test_moderator_reply_resolves() {
        let course = create_course(StorageBackend::Relational, 20);
        let tid = course
            .topics
            .create_topic(&course.student, course.cid, &new_topic("Recursion", false, vec![]))
            .unwrap()
            .topic
            .tid;

        course
            .topics
            .reply(&course.instructor, tid, &new_reply("Think about the base case"))
            .unwrap();

        let topic = course.topics.topic_with_posts(&course.student, tid).unwrap().topic;
        assert!(topic.is_resolved);
        assert!(topic.resolved_at.is_some());
        let resolved_by = topic.resolved_by.expect("resolvedBy should be set");
        assert_eq!(resolved_by.uid, course.instructor.uid);
        assert_eq!(resolved_by.role, ForumRole::Moderator);
    }

    #[test]
    fn test_already_resolved_keeps_first_resolver() {
        let course = create_course(StorageBackend::Relational, 20);
        let tid = course
            .topics
            .create_topic(&course.student, course.cid, &new_topic("Pointers", false, vec![]))
            .unwrap()
            .topic
            .tid;

        course.topics.reply(&course.admin, tid, &new_reply("See lecture 4")).unwrap();
        let first = course.topics.topic_with_posts(&course.admin, tid).unwrap().topic;
        let first_by = first.resolved_by.clone().unwrap();
        assert_eq!(first_by.role, ForumRole::Admin);

        course
            .topics
            .reply(&course.instructor, tid, &new_reply("And lecture 5"))
            .unwrap();
        let tracker = course.topics.resolution();
        assert!(!tracker.auto_resolve_if_needed(tid, course.instructor.uid).unwrap());

        let second = course.topics.topic_with_posts(&course.admin, tid).unwrap().topic;
        assert_eq!(second.resolved_by, Some(first_by));
        assert_eq!(second.resolved_at, first.resolved_at);
    }

    #[test]
    fn test_explicit_resolve_and_unresolve() {
        let course = create_course(StorageBackend::Relational, 20);
        let tid = course
            .topics
            .create_topic(&course.student, course.cid, &new_topic("Big O", false, vec![]))
            .unwrap()
            .topic
            .tid;
        let tracker = course.topics.resolution();

        assert!(matches!(
            tracker.resolve(&course.student, tid),
            Err(ForumError::Forbidden)
        ));
        assert!(matches!(
            tracker.resolve(&Caller::GUEST, tid),
            Err(ForumError::Unauthenticated)
        ));
        assert!(matches!(
            tracker.resolve(&course.instructor, 9999),
            Err(ForumError::NotFound(_))
        ));

        let topic = tracker.resolve(&course.instructor, tid).unwrap();
        assert!(topic.is_resolved);

        let topic = tracker.unresolve(&course.admin, tid).unwrap();
        assert!(!topic.is_resolved);
        assert!(topic.resolved_at.is_none());
        assert!(topic.resolved_by.is_none());

        // a student reply after unresolve leaves it open
        course.topics.reply(&course.student, tid, &new_reply("Still stuck")).unwrap();
        let topic = course.topics.topic_with_posts(&course.student, tid).unwrap().topic;
        assert!(!topic.is_resolved);
    }

    #[test]
    fn test_user_role_in_category() {
        let course = create_course(StorageBackend::Relational, 20);
        let other = categories::create_category(&course.db, "CS 102").unwrap();
        let tracker = course.topics.resolution();

        assert_eq!(
            tracker.user_role_in_category(course.admin.uid, course.cid).unwrap(),
            ForumRole::Admin
        );
        assert_eq!(
            tracker.user_role_in_category(course.instructor.uid, course.cid).unwrap(),
            ForumRole::Moderator
        );
        assert_eq!(
            tracker.user_role_in_category(course.instructor.uid, other.cid).unwrap(),
            ForumRole::User
        );
        assert_eq!(
            tracker.user_role_in_category(0, course.cid).unwrap(),
            ForumRole::Guest
        );
        assert!(!tracker.can_auto_resolve(course.student.uid, course.cid).unwrap());
    }

    #[test]
    fn test_mark_unresolved_missing_topic() {
        let course = create_course(StorageBackend::Relational, 20);
        let tracker = course.topics.resolution();
        assert!(matches!(
            tracker.mark_unresolved(12345),
            Err(ForumError::NotFound(_))
        ));
        assert!(!tracker.auto_resolve_if_needed(12345, course.admin.uid).unwrap());
    }
}

mod anonymity_tests {
    use super::*;

    #[test]
    fn test_anonymous_topic_hides_author_uid_in_json() {
        for backend in BACKENDS {
            let course = create_course(backend, 20);
            let tid = course
                .topics
                .create_topic(&course.student, course.cid, &new_topic("Grades", true, vec![]))
                .unwrap()
                .topic
                .tid;

            let seen = course.topics.topic_with_posts(&course.classmate, tid).unwrap();
            let json = serde_json::to_value(&seen).unwrap();
            assert_eq!(json["uid"], 0);
            assert_eq!(json["posts"][0]["user"]["uid"], 0);

            let page = course
                .topics
                .list_category_topics(&course.classmate, course.cid, &TopicFilter::default())
                .unwrap();
            let json = serde_json::to_value(&page).unwrap();
            assert_eq!(json["topics"][0]["uid"], 0);
            assert_eq!(json["topics"][0]["mainPost"]["user"]["uid"], 0);

            let seen = course.topics.topic_with_posts(&course.instructor, tid).unwrap();
            let json = serde_json::to_value(&seen).unwrap();
            assert_eq!(json["uid"], course.student.uid);

            let page = course
                .topics
                .list_category_topics(&course.admin, course.cid, &TopicFilter::default())
                .unwrap();
            let json = serde_json::to_value(&page).unwrap();
            assert_eq!(json["topics"][0]["uid"], course.student.uid);
        }
    }

    #[test]
    fn test_named_topic_keeps_author_uid() {
        let course = create_course(StorageBackend::Relational, 20);
        let tid = course
            .topics
            .create_topic(&course.student, course.cid, &new_topic("Loops", false, vec![]))
            .unwrap()
            .topic
            .tid;

        let seen = course.topics.topic_with_posts(&course.classmate, tid).unwrap();
        assert_eq!(seen.topic.uid, course.student.uid);
    }

    #[test]
    fn test_anonymous_topic_masked_for_students() {
        for backend in BACKENDS {
            let course = create_course(backend, 20);
            let topic = course
                .topics
                .create_topic(&course.student, course.cid, &new_topic("Grades", true, vec![]))
                .unwrap();
            let tid = topic.topic.tid;

            let seen = course.topics.topic_with_posts(&course.classmate, tid).unwrap();
            let post = &seen.posts[0];
            assert!(post.is_anonymous);
            let user = post.user.as_ref().unwrap();
            assert_eq!(user.uid, 0);
            assert_eq!(user.username, "Anonymous");
            assert_eq!(user.displayname, "Anonymous");
            assert_eq!(user.icon_text, "?");
            assert_eq!(user.icon_bg_color, "#aaa");
            assert!(user.userslug.is_empty());
            assert!(!post.display_edit_tools);
            assert!(post.is_anonymous_to_instructor.is_none());

            let json = serde_json::to_string(&seen).unwrap();
            assert!(!json.contains("alice"));
        }
    }

    #[test]
    fn test_anonymous_topic_revealed_to_moderators() {
        let course = create_course(StorageBackend::Relational, 20);
        let tid = course
            .topics
            .create_topic(&course.student, course.cid, &new_topic("Grades", true, vec![]))
            .unwrap()
            .topic
            .tid;

        for viewer in [course.instructor, course.admin] {
            let seen = course.topics.topic_with_posts(&viewer, tid).unwrap();
            let post = &seen.posts[0];
            assert_eq!(post.user.as_ref().unwrap().username, "alice");
            assert_eq!(post.is_anonymous_to_instructor, Some(true));
            assert!(post.display_moderator_tools);
        }
    }

    #[test]
    fn test_author_sees_own_anonymous_post_masked() {
        let course = create_course(StorageBackend::Relational, 20);
        let tid = course
            .topics
            .create_topic(&course.student, course.cid, &new_topic("Grades", true, vec![]))
            .unwrap()
            .topic
            .tid;

        let seen = course.topics.topic_with_posts(&course.student, tid).unwrap();
        let post = &seen.posts[0];
        assert_eq!(post.user.as_ref().unwrap().uid, 0);
        assert!(!post.self_post);
    }

    #[test]
    fn test_named_posts_are_untouched() {
        let course = create_course(StorageBackend::Relational, 20);
        let tid = course
            .topics
            .create_topic(&course.student, course.cid, &new_topic("Loops", false, vec![]))
            .unwrap()
            .topic
            .tid;
        let reply = course
            .topics
            .reply(
                &course.classmate,
                tid,
                &CreateReply {
                    content: Some("Anonymous answer".to_string()),
                    is_anonymous: true,
                },
            )
            .unwrap();

        let seen = course.topics.topic_with_posts(&Caller::GUEST, tid).unwrap();
        assert_eq!(seen.posts.len(), 2);
        assert_eq!(seen.posts[0].user.as_ref().unwrap().username, "alice");
        assert!(!seen.posts[0].is_anonymous);
        assert_eq!(seen.posts[1].pid, reply.pid);
        assert_eq!(seen.posts[1].user.as_ref().unwrap().uid, 0);

        let own = course.topics.post(&course.student, seen.posts[0].pid).unwrap();
        assert!(own.self_post);
        assert!(own.display_edit_tools);
        assert!(!own.display_move_tools);
    }
}

mod topic_tests {
    use super::*;

    #[test]
    fn test_create_topic_tags_main_post() {
        for backend in BACKENDS {
            let course = create_course(backend, 20);
            let store = course.tags.store();
            let hw = store.create("Homework 1", None, None).unwrap();

            let created = course
                .topics
                .create_topic(&course.student, course.cid, &new_topic("HW1 Q3", false, vec![hw.id]))
                .unwrap();
            let main_pid = created.topic.main_pid.expect("main post should be set");
            assert_eq!(created.posts[0].pid, main_pid);
            assert_eq!(created.posts[0].assignment_tags.len(), 1);
            assert_eq!(created.posts[0].assignment_tags[0].name, "Homework 1");
            assert_eq!(store.get_tag_posts(hw.id).unwrap(), vec![main_pid]);
        }
    }

    #[test]
    fn test_create_topic_rejects_unknown_tag() {
        for backend in BACKENDS {
            let course = create_course(backend, 20);
            let result = course.topics.create_topic(
                &course.student,
                course.cid,
                &new_topic("HW1 Q3", false, vec![404]),
            );
            assert!(matches!(result, Err(ForumError::NotFound(_))));

            let page = course
                .topics
                .list_category_topics(&course.student, course.cid, &TopicFilter::default())
                .unwrap();
            assert_eq!(page.topic_count, 0);
        }
    }

    #[test]
    fn test_create_topic_validation() {
        let course = create_course(StorageBackend::Relational, 20);

        assert!(matches!(
            course
                .topics
                .create_topic(&Caller::GUEST, course.cid, &new_topic("Hi", false, vec![])),
            Err(ForumError::Unauthenticated)
        ));
        assert!(matches!(
            course.topics.create_topic(
                &course.student,
                course.cid,
                &CreateTopic {
                    title: Some("  ".to_string()),
                    content: Some("body".to_string()),
                    ..Default::default()
                }
            ),
            Err(ForumError::InvalidData(_))
        ));
        assert!(matches!(
            course
                .topics
                .create_topic(&course.student, 999, &new_topic("Hi", false, vec![])),
            Err(ForumError::NotFound(_))
        ));
        assert!(matches!(
            course.topics.reply(&course.student, 999, &new_reply("Hello")),
            Err(ForumError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_filters_by_tags_and_resolution() {
        for backend in BACKENDS {
            let course = create_course(backend, 20);
            let store = course.tags.store();
            let hw = store.create("Homework", None, None).unwrap();
            let exam = store.create("Exam", None, None).unwrap();

            let t1 = course
                .topics
                .create_topic(&course.student, course.cid, &new_topic("One", false, vec![hw.id]))
                .unwrap()
                .topic
                .tid;
            let t2 = course
                .topics
                .create_topic(&course.student, course.cid, &new_topic("Two", false, vec![exam.id]))
                .unwrap()
                .topic
                .tid;
            let t3 = course
                .topics
                .create_topic(&course.student, course.cid, &new_topic("Three", false, vec![]))
                .unwrap()
                .topic
                .tid;
            course.topics.reply(&course.instructor, t2, &new_reply("Answered")).unwrap();

            let list = |filter: TopicFilter| -> Vec<i64> {
                course
                    .topics
                    .list_category_topics(&course.student, course.cid, &filter)
                    .unwrap()
                    .topics
                    .iter()
                    .map(|s| s.topic.tid)
                    .collect()
            };

            assert_eq!(list(TopicFilter::default()), vec![t3, t2, t1]);
            assert_eq!(
                list(TopicFilter {
                    tag_ids: vec![hw.id],
                    ..Default::default()
                }),
                vec![t1]
            );
            assert_eq!(
                list(TopicFilter {
                    tag_ids: vec![hw.id, exam.id],
                    ..Default::default()
                }),
                vec![t2, t1]
            );
            assert_eq!(
                list(TopicFilter {
                    resolved: Some(true),
                    ..Default::default()
                }),
                vec![t2]
            );
            assert_eq!(
                list(TopicFilter {
                    resolved: Some(false),
                    ..Default::default()
                }),
                vec![t3, t1]
            );
            assert!(list(TopicFilter {
                tag_ids: vec![exam.id],
                resolved: Some(false),
                ..Default::default()
            })
            .is_empty());
        }
    }

    #[test]
    fn test_list_paginates() {
        let course = create_course(StorageBackend::Relational, 2);
        for n in 0..5 {
            course
                .topics
                .create_topic(
                    &course.student,
                    course.cid,
                    &new_topic(&format!("Topic {}", n), false, vec![]),
                )
                .unwrap();
        }

        let page = course
            .topics
            .list_category_topics(
                &course.student,
                course.cid,
                &TopicFilter {
                    page: 3,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(page.topic_count, 5);
        assert_eq!(page.page_count, 3);
        assert_eq!(page.page, 3);
        assert_eq!(page.topics.len(), 1);
        assert_eq!(page.topics[0].topic.title, "Topic 0");

        let empty = course
            .topics
            .list_category_topics(
                &course.student,
                course.cid,
                &TopicFilter {
                    page: 9,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(empty.topics.is_empty());
    }

    #[test]
    fn test_list_out_of_range_page_is_empty() {
        let course = create_course(StorageBackend::Relational, 20);
        course
            .topics
            .create_topic(&course.student, course.cid, &new_topic("Only", false, vec![]))
            .unwrap();

        let page = course
            .topics
            .list_category_topics(
                &course.student,
                course.cid,
                &TopicFilter {
                    page: usize::MAX,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(page.topic_count, 1);
        assert_eq!(page.page_count, 1);
        assert!(page.topics.is_empty());
    }

    #[test]
    fn test_listing_masks_anonymous_main_posts() {
        let course = create_course(StorageBackend::Relational, 20);
        course
            .topics
            .create_topic(&course.student, course.cid, &new_topic("Secret", true, vec![]))
            .unwrap();

        let page = course
            .topics
            .list_category_topics(&course.classmate, course.cid, &TopicFilter::default())
            .unwrap();
        let main = page.topics[0].main_post.as_ref().unwrap();
        assert_eq!(main.user.as_ref().unwrap().username, "Anonymous");

        let page = course
            .topics
            .list_category_topics(&course.instructor, course.cid, &TopicFilter::default())
            .unwrap();
        let main = page.topics[0].main_post.as_ref().unwrap();
        assert_eq!(main.user.as_ref().unwrap().username, "alice");
    }
}

mod concurrency_tests {
    use super::*;
    use std::thread;

    const WRITERS: usize = 8;
    const TAGS_PER_WRITER: usize = 25;

    #[test]
    fn test_concurrent_tag_writes_on_file_database() {
        for backend in BACKENDS {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("courseboard.db");
            let db = Database::open(path.to_str().unwrap()).expect("Failed to open database");
            db.migrate().expect("Failed to run migrations");
            let store = open_tag_store(backend, &db);
            let shared = store.create("Shared", None, None).unwrap();

            let handles: Vec<_> = (0..WRITERS)
                .map(|writer| {
                    let store = store.clone();
                    let shared_id = shared.id;
                    thread::spawn(move || {
                        for n in 0..TAGS_PER_WRITER {
                            let tag = store
                                .create(&format!("Tag {}-{}", writer, n), None, None)
                                .expect("Concurrent create failed");
                            let pid = (writer * TAGS_PER_WRITER + n) as i64 + 1;
                            store
                                .set_post_tags(pid, &[shared_id, tag.id])
                                .expect("Concurrent set_post_tags failed");
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().expect("Writer thread panicked");
            }

            let tags = store.get_all().unwrap();
            assert_eq!(tags.len(), WRITERS * TAGS_PER_WRITER + 1);
            let mut ids: Vec<i64> = tags.iter().map(|t| t.id).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), tags.len());
            assert_eq!(
                store.get_tag_posts(shared.id).unwrap().len(),
                WRITERS * TAGS_PER_WRITER
            );
        }
    }
}

mod user_tests {
    use super::*;

    #[test]
    fn test_token_resolves_to_user() {
        let db = create_test_db();
        let (caller, token) = create_user(&db, "carol", &["instructors"]);

        assert!(token.starts_with("cb_"));
        assert_eq!(users::uid_for_token(&db, &token).unwrap(), Some(caller.uid));
        assert_eq!(users::uid_for_token(&db, "cb_not-a-token").unwrap(), None);
        assert_eq!(users::uid_for_token(&db, "garbage").unwrap(), None);

        let user = users::get_user(&db, caller.uid).unwrap().unwrap();
        assert_eq!(user.userslug, "carol");
        assert_eq!(user.displayname, "carol");
        assert_eq!(user.groups, vec!["instructors".to_string()]);
    }

    #[test]
    fn test_duplicate_username_fails() {
        let db = create_test_db();
        create_user(&db, "dave", &[]);
        assert!(users::create_user(&db, "dave", None, &[]).is_err());
    }
}

mod http_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use courseboard::web::{router, AppState};
    use courseboard::Config;
    use tower::ServiceExt;

    struct App {
        router: axum::Router,
        cid: i64,
        instructor: String,
        student: String,
    }

    fn create_app(backend: StorageBackend) -> App {
        let db = create_test_db();
        let (instructor, instructor_token) = create_user(&db, "prof", &["instructors"]);
        let (_, student_token) = create_user(&db, "alice", &[]);
        let category = categories::create_category(&db, "CS 101").unwrap();
        categories::add_moderator(&db, category.cid, instructor.uid).unwrap();

        let mut config = Config::default();
        config.storage.backend = backend;
        let state = Arc::new(AppState::new(config, db).expect("Failed to build state"));

        App {
            router: router(state),
            cid: category.cid,
            instructor: instructor_token,
            student: student_token,
        }
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &App, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn send_json(app: &App, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, bytes) = send(app, req).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_tag_crud_over_http() {
        for backend in BACKENDS {
            let app = create_app(backend);

            let (status, body) = send_json(
                &app,
                request(
                    "POST",
                    "/assignment-tags",
                    Some(&app.instructor),
                    Some(serde_json::json!({"name": "Homework 1", "color": "#ff0000"})),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["data"]["name"], "Homework 1");
            assert_eq!(body["data"]["color"], "#ff0000");
            let id = body["data"]["id"].as_i64().unwrap();

            let (status, body) =
                send_json(&app, request("GET", "/assignment-tags", Some(&app.student), None)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["data"].as_array().unwrap().len(), 1);

            let (status, body) = send_json(
                &app,
                request(
                    "PUT",
                    &format!("/assignment-tags/{}", id),
                    Some(&app.instructor),
                    Some(serde_json::json!({"category": "homework"})),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["data"]["category"], "homework");

            let (status, _) = send_json(
                &app,
                request("DELETE", &format!("/assignment-tags/{}", id), Some(&app.instructor), None),
            )
            .await;
            assert_eq!(status, StatusCode::OK);

            let (status, body) = send_json(
                &app,
                request("GET", &format!("/assignment-tags/{}", id), Some(&app.student), None),
            )
            .await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert!(body["message"].as_str().unwrap().contains("not found"));
        }
    }

    #[tokio::test]
    async fn test_tag_errors_map_to_status_codes() {
        let app = create_app(StorageBackend::Relational);

        let (status, _) = send_json(&app, request("GET", "/assignment-tags", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send_json(
            &app,
            request("GET", "/assignment-tags", Some("cb_forged"), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send_json(
            &app,
            request(
                "POST",
                "/assignment-tags",
                Some(&app.student),
                Some(serde_json::json!({"name": "Mine"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send_json(
            &app,
            request(
                "POST",
                "/assignment-tags",
                Some(&app.instructor),
                Some(serde_json::json!({"name": ""})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_json(
            &app,
            request(
                "PUT",
                "/assignment-tags/posts/1",
                Some(&app.instructor),
                Some(serde_json::json!({})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_topic_flow_over_http() {
        let app = create_app(StorageBackend::Relational);

        let (_, body) = send_json(
            &app,
            request(
                "POST",
                "/assignment-tags",
                Some(&app.instructor),
                Some(serde_json::json!({"name": "Homework 1"})),
            ),
        )
        .await;
        let tag_id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = send_json(
            &app,
            request(
                "POST",
                &format!("/categories/{}/topics", app.cid),
                Some(&app.student),
                Some(serde_json::json!({
                    "title": "Stuck on Q2",
                    "content": "Help",
                    "isAnonymous": 1,
                    "tags": [tag_id],
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let tid = body["data"]["tid"].as_i64().unwrap();
        assert_eq!(body["data"]["isResolved"], false);
        assert_eq!(body["data"]["posts"][0]["assignmentTags"][0]["name"], "Homework 1");

        let (status, body) =
            send_json(&app, request("GET", &format!("/topics/{}", tid), None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["posts"][0]["user"]["username"], "Anonymous");
        assert_eq!(body["data"]["posts"][0]["user"]["icon:text"], "?");
        assert_eq!(body["data"]["uid"], 0);

        let (status, _) = send_json(
            &app,
            request(
                "POST",
                &format!("/topics/{}", tid),
                Some(&app.instructor),
                Some(serde_json::json!({"content": "Check the slides"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send_json(
            &app,
            request(
                "GET",
                &format!("/categories/{}/topics?assignmentTags={}&resolved=true", app.cid, tag_id),
                Some(&app.student),
                None,
            ),
        )
        .await;
        let topics = body["data"]["topics"].as_array().unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0]["isResolved"], true);
        assert_eq!(topics[0]["resolvedBy"]["role"], "moderator");

        let (status, _) = send_json(
            &app,
            request("DELETE", &format!("/topics/{}/resolve", tid), Some(&app.student), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send_json(
            &app,
            request("DELETE", &format!("/topics/{}/resolve", tid), Some(&app.instructor), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["isResolved"], false);

        let (_, body) = send_json(
            &app,
            request(
                "GET",
                &format!("/categories/{}/topics?answered=false", app.cid),
                Some(&app.student),
                None,
            ),
        )
        .await;
        assert_eq!(body["data"]["topicCount"], 1);
    }

    #[tokio::test]
    async fn test_admin_page() {
        for backend in BACKENDS {
            let app = create_app(backend);
            send_json(
                &app,
                request(
                    "POST",
                    "/assignment-tags",
                    Some(&app.instructor),
                    Some(serde_json::json!({"name": "Final Project"})),
                ),
            )
            .await;

            let (status, _) =
                send(&app, request("GET", "/admin/assignment-tags", Some(&app.student), None)).await;
            assert_eq!(status, StatusCode::FORBIDDEN);

            let (status, bytes) =
                send(&app, request("GET", "/admin/assignment-tags", Some(&app.instructor), None)).await;
            assert_eq!(status, StatusCode::OK);
            let html = String::from_utf8(bytes).unwrap();
            assert!(html.contains("Final Project"));
            if backend == StorageBackend::KeyValue {
                assert!(html.contains("requires the relational storage backend"));
            }
        }
    }
}
