diesel::table! {
    users (id) {
        id -> Varchar,
        email -> Varchar,
        display_name -> Varchar,
        photo_url -> Varchar,
        is_admin -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    products (id) {
        id -> Varchar,
        name -> Varchar,
        description -> Text,
        price -> Numeric,
        image_url -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    orders (id) {
        id -> Varchar,
        user_id -> Varchar,
        total_amount -> Numeric,
        payment_status -> Varchar,
        status -> Varchar,
        products -> Jsonb,
        shipping_address -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    artists (id) {
        id -> Varchar,
        name -> Varchar,
        artist_name -> Varchar,
        tags -> Array<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    subjects (id) {
        id -> Varchar,
        category -> Varchar,
        #[sql_name = "subjects"]
        subject_names -> Array<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    home_images (id) {
        id -> Varchar,
        title -> Varchar,
        file_link -> Varchar,
        aspect_ratio -> Varchar,
        dimensions -> Varchar,
        tags -> Array<Text>,
        suggested_locations -> Array<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    images (id) {
        id -> Varchar,
        url -> Varchar,
        title -> Varchar,
        user_id -> Nullable<Varchar>,
        artist_id -> Nullable<Varchar>,
        subjects -> Array<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    order_requests (id) {
        id -> Varchar,
        order_id -> Varchar,
        processed -> Bool,
        created_at -> Nullable<Timestamptz>,
        processed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    order_processing_queue (id) {
        id -> Varchar,
        order_id -> Varchar,
        status -> Varchar,
        steps -> Jsonb,
        queued_at -> Nullable<Timestamptz>,
        completed_at -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    users,
    products,
    orders,
    artists,
    subjects,
    home_images,
    images,
    order_requests,
    order_processing_queue,
);
