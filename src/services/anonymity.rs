use crate::models::{PostUser, PostView, Topic};

pub const ANONYMOUS_NAME: &str = "Anonymous";
const ANONYMOUS_ICON_TEXT: &str = "?";
const ANONYMOUS_ICON_COLOR: &str = "#aaa";

/// What a viewer may do within one topic.
#[derive(Debug, Clone, Copy)]
pub struct TopicPrivileges {
    pub uid: i64,
    /// Administrators and moderators of the topic's category.
    pub can_moderate: bool,
}

/// Replaces everything that identifies the author of `post`. Posts without an
/// author block are left alone.
pub fn mask_anonymous_post_user(post: &mut PostView) {
    let Some(user) = post.user.as_mut() else {
        return;
    };

    *user = PostUser {
        uid: 0,
        username: ANONYMOUS_NAME.to_string(),
        displayname: ANONYMOUS_NAME.to_string(),
        icon_text: ANONYMOUS_ICON_TEXT.to_string(),
        icon_bg_color: ANONYMOUS_ICON_COLOR.to_string(),
        ..PostUser::default()
    };

    post.self_post = false;
    post.display_edit_tools = false;
    post.display_delete_tools = false;
    post.display_moderator_tools = false;
    post.display_move_tools = false;
}

/// Computes the per-viewer tool flags of every post and applies anonymity:
/// anonymous posts are masked for viewers who cannot moderate, and flagged
/// with `isAnonymousToInstructor` for those who can.
pub fn modify_posts_by_privilege(posts: &mut [PostView], privileges: &TopicPrivileges) {
    for post in posts.iter_mut() {
        post.self_post = privileges.uid > 0 && post.author_uid == privileges.uid;
        post.display_edit_tools = privileges.can_moderate || post.self_post;
        post.display_delete_tools = privileges.can_moderate || post.self_post;
        post.display_moderator_tools = post.display_edit_tools || post.display_delete_tools;
        post.display_move_tools = privileges.can_moderate;

        if !post.is_anonymous {
            continue;
        }
        if privileges.can_moderate {
            post.is_anonymous_to_instructor = Some(true);
        } else {
            mask_anonymous_post_user(post);
        }
    }
}

/// Hides the topic's author when its main post is anonymous and the viewer
/// cannot moderate. The main post itself is masked by
/// [`modify_posts_by_privilege`].
pub fn mask_anonymous_topic(topic: &mut Topic, main_post: Option<&PostView>, privileges: &TopicPrivileges) {
    if privileges.can_moderate {
        return;
    }
    if main_post.map_or(false, |post| post.is_anonymous) {
        topic.uid = 0;
    }
}
